/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! System orchestration: one boot of the fixture, from bring-up to the fault
//! that ends it.
//!
//! ```text
//! run()
//!  ├─ SensorArray::bring_up ── Err ──► restart(fault), return fault
//!  ├─ Actuator::new(pwm, max_level)
//!  ├─ spawn idle task   (owns the actuator)
//!  ├─ spawn monitor task (owns the array, idle link, restart)
//!  └─ wait for either to end
//!       ├─ monitor returned fault ─► stop idle, return fault
//!       └─ idle ended / monitor panicked ─► stop the other, restart(fault), return fault
//! ```
//!
//! After `run` returns neither task is alive, so nothing drives the bus or
//! the actuator until the caller boots the fixture again.

use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{error, info};

use crate::actuator::Actuator;
use crate::array::SensorArray;
use crate::config::FixtureConfig;
use crate::error::FixtureError;
use crate::hw::{I2cBus, PwmChannel, ResetLine, Restart};
use crate::tasks::{spawn_idle, Monitor};

/// Board collaborators for one boot.
pub struct Hardware<B, R, P> {
    pub bus: B,
    /// `reset_lines[i]` drives sensor `i`.
    pub reset_lines: Vec<R>,
    pub pwm: P,
    pub restart: Arc<dyn Restart>,
}

/// Boot the fixture and run it until a fatal fault.
///
/// The restart primitive is invoked exactly once for the returned fault.
pub async fn run<B, R, P>(config: &FixtureConfig, hw: Hardware<B, R, P>) -> FixtureError
where
    B: I2cBus + 'static,
    R: ResetLine + 'static,
    P: PwmChannel + 'static,
{
    let Hardware {
        bus,
        reset_lines,
        pwm,
        restart,
    } = hw;

    // ── Bring-up ──────────────────────────────────────────────────────────────
    let array = match SensorArray::bring_up(bus, reset_lines, &config.sensors).await {
        Ok(array) => array,
        Err(fault) => {
            error!(error = %fault, "bring-up failed, requesting restart");
            restart.restart(&fault);
            return fault;
        }
    };

    // ── Tasks ─────────────────────────────────────────────────────────────────
    let actuator = Actuator::new(pwm, config.output.max_level());
    let (idle, link) = spawn_idle(actuator);
    let monitor = Monitor::new(array, link, restart.clone(), &config.trigger);
    let mut monitor = tokio::spawn(monitor.run());
    let mut idle_join = idle.join;

    info!(
        sensors = config.sensors.count,
        threshold_mm = config.trigger.threshold_mm,
        "fixture running"
    );

    let ended = tokio::select! {
        result = &mut monitor => Ended::Monitor(result),
        result = &mut idle_join => Ended::Idle(result),
    };

    match ended {
        Ended::Monitor(result) => {
            idle_join.abort();
            report_idle_exit(idle_join.await);
            match result {
                Ok(fault) => fault,
                Err(e) => {
                    error!(error = %e, "monitor task failed");
                    escalate(restart.as_ref(), FixtureError::MonitorTaskGone)
                }
            }
        }
        Ended::Idle(result) => {
            if let Err(e) = result {
                error!(error = %e, "idle task failed");
            }
            monitor.abort();
            match monitor.await {
                // Monitor saw it first and already escalated.
                Ok(fault) => fault,
                Err(_) => escalate(restart.as_ref(), FixtureError::IdleTaskGone),
            }
        }
    }
}

enum Ended {
    Monitor(Result<FixtureError, JoinError>),
    Idle(Result<(), JoinError>),
}

/// The idle task is aborted on the way out, so a cancellation is expected;
/// anything else is logged.  Returns `true` if the task had panicked.
fn report_idle_exit(result: Result<(), JoinError>) -> bool {
    match result {
        Err(e) if e.is_panic() => {
            error!(error = %e, "idle task panicked");
            true
        }
        _ => false,
    }
}

fn escalate(restart: &dyn Restart, fault: FixtureError) -> FixtureError {
    error!(error = %fault, "requesting restart");
    restart.restart(&fault);
    fault
}

// ── Tests ─────────────────────────────────────────────────────────────────────
