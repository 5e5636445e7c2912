/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Idle task: plays [`IDLE`] forever, yielding to the monitor on request.

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{IdleCommand, TaskState};
use crate::actuator::Actuator;
use crate::hw::PwmChannel;
use crate::waveform::{Step, IDLE};

/// Task body.  Returns only when the command channel is closed.
///
/// Each step applies its level and then waits its hold time.  The wait is the
/// yield point: a `Suspend` arriving during it ends the step early, the
/// actuator goes back over the handoff, and nothing is written until a
/// `Resume` brings it back.  After a resume the cycle starts again at the
/// first step.
pub async fn run<P: PwmChannel>(
    mut actuator: Actuator<P>,
    mut commands: mpsc::Receiver<IdleCommand<P>>,
    state: watch::Sender<TaskState>,
) {
    debug!("idle task started");
    let mut cycles: u64 = 0;

    'cycle: loop {
        for step in IDLE.steps() {
            if let Step::Level { level, .. } = step {
                actuator.set_level(level);
            }

            let command = tokio::select! {
                biased;
                cmd = commands.recv() => cmd,
                _ = sleep(step.hold()) => continue,
            };

            match command {
                None => break 'cycle,
                Some(IdleCommand::Suspend { handoff }) => {
                    state.send_replace(TaskState::Suspended);
                    debug!(level = actuator.level(), "idle handing over actuator");
                    actuator = match handoff.send(actuator) {
                        Ok(()) => match wait_for_resume(&mut commands).await {
                            Some(a) => a,
                            None => break 'cycle,
                        },
                        // Requester went away before taking it.
                        Err(a) => a,
                    };
                    state.send_replace(TaskState::Running);
                    continue 'cycle;
                }
                Some(IdleCommand::Resume { actuator: stray }) => {
                    warn!(level = stray.level(), "resume while running, ignored");
                }
            }
        }
        cycles += 1;
        debug!(cycle = cycles, "idle cycle complete");
    }

    debug!("idle task stopped");
}

/// Block until the actuator comes back.  `None` if the channel closed.
async fn wait_for_resume<P>(commands: &mut mpsc::Receiver<IdleCommand<P>>) -> Option<Actuator<P>> {
    loop {
        match commands.recv().await? {
            IdleCommand::Resume { actuator } => return Some(actuator),
            IdleCommand::Suspend { .. } => {
                // Actuator is already out; dropping the handoff tells the
                // requester so.
                warn!("suspend while suspended, ignored");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
