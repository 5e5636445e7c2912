/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The two concurrent units of the fixture and the handshake between them.
//!
//! ```text
//!              IdleCommand::Suspend { handoff } ──►
//!   Monitor  ◄── Actuator (oneshot) ────────────────   Idle
//!            ── IdleCommand::Resume { actuator } ──►
//!            ◄── TaskState (watch) ──────────────────
//! ```
//!
//! The [`Actuator`] value itself travels through the handshake.  Whoever holds
//! it is the only task able to write a level, so the idle waveform can never
//! interleave with the awaken waveform.

pub mod idle;
pub mod monitor;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::actuator::Actuator;
use crate::error::FixtureError;
use crate::hw::PwmChannel;

pub use monitor::{Debounce, Monitor};

/// Published run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Suspended,
}

/// Directed signal from the monitor to the idle task.
#[derive(Debug)]
pub enum IdleCommand<P> {
    /// Stop at the current step and send the actuator back on `handoff`.
    Suspend { handoff: oneshot::Sender<Actuator<P>> },
    /// Take the actuator back and restart the idle cycle from the top.
    Resume { actuator: Actuator<P> },
}

/// Orchestrator side of a spawned idle task.
#[derive(Debug)]
pub struct IdleHandle {
    pub join: JoinHandle<()>,
    pub state: watch::Receiver<TaskState>,
}

/// Monitor side of the preemption handshake.
#[derive(Debug)]
pub struct IdleLink<P> {
    commands: mpsc::Sender<IdleCommand<P>>,
    state: watch::Receiver<TaskState>,
}

/// Spawn the idle task with ownership of `actuator`.
pub fn spawn_idle<P>(actuator: Actuator<P>) -> (IdleHandle, IdleLink<P>)
where
    P: PwmChannel + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(1);
    let (state_tx, state_rx) = watch::channel(TaskState::Running);

    let join = tokio::spawn(idle::run(actuator, cmd_rx, state_tx));

    (
        IdleHandle {
            join,
            state: state_rx.clone(),
        },
        IdleLink {
            commands: cmd_tx,
            state: state_rx,
        },
    )
}

impl<P> IdleLink<P> {
    /// Ask the idle task to stop and wait until it has handed the actuator
    /// over.  On return the idle task is `Suspended`.
    pub async fn suspend(&mut self) -> Result<Actuator<P>, FixtureError> {
        let (handoff, received) = oneshot::channel();
        self.commands
            .send(IdleCommand::Suspend { handoff })
            .await
            .map_err(|_| FixtureError::IdleTaskGone)?;
        let actuator = received.await.map_err(|_| FixtureError::IdleTaskGone)?;
        debug!(level = actuator.level(), "idle suspended");
        Ok(actuator)
    }

    /// Give the actuator back and wait until the idle task reports
    /// `Running` again.
    pub async fn resume(&mut self, actuator: Actuator<P>) -> Result<(), FixtureError> {
        self.commands
            .send(IdleCommand::Resume { actuator })
            .await
            .map_err(|_| FixtureError::IdleTaskGone)?;
        while *self.state.borrow_and_update() != TaskState::Running {
            self.state
                .changed()
                .await
                .map_err(|_| FixtureError::IdleTaskGone)?;
        }
        debug!("idle resumed");
        Ok(())
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }
}
