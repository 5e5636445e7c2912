/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the fixture runtime.
//!
//! Three enums model the three failure layers:
//!
//! * [`BusError`]: a single transfer on the shared sensor bus failed.
//! * [`InitFailureReason`]: why one sensor did not complete bring-up.
//! * [`FixtureError`]: a fatal fault of the whole fixture.  Every variant is
//!   handed to the [`Restart`](crate::hw::Restart) primitive; there is no
//!   local recovery and no partial-array mode.
//!
//! Configuration validation has its own enum in
//! [`config::ConfigError`](crate::config::ConfigError).

use thiserror::Error;

// ── Bus transfers ─────────────────────────────────────────────────────────────

/// Failure of one transfer on the sensor bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Nobody acknowledged `address`.
    #[error("no acknowledge from address {address:#04x}")]
    Nack { address: u8 },

    /// More than one device answered at `address`.
    ///
    /// Happens when two sensors still sitting at the shared default address
    /// are enabled at the same time.
    #[error("{responders} devices answered at address {address:#04x}")]
    Collision { address: u8, responders: usize },

    /// Any other transport-level failure (arbitration lost, bus stuck, ...).
    #[error("bus transport error: {0}")]
    Transport(String),
}

// ── Sensor bring-up ───────────────────────────────────────────────────────────

/// Detailed reason why a sensor failed bring-up.
///
/// Carried inside [`FixtureError::InitFailure`] so the restart log always says
/// both *which* sensor failed and *why*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitFailureReason {
    /// The identification read was not acknowledged.
    NoResponse(BusError),

    /// The device answered but is not the expected sensor model.
    UnexpectedModelId { expected: u16, found: u16 },

    /// Firmware did not report "booted" within the bring-up timeout.
    BootTimeout { timeout_ms: u64 },

    /// `set_address` was called a second time on the same device.
    AddressAlreadyAssigned { address: u8 },

    /// A configuration write after a successful handshake failed.
    Bus(BusError),
}

impl std::fmt::Display for InitFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitFailureReason::NoResponse(e) => write!(f, "no response to identification: {e}"),
            InitFailureReason::UnexpectedModelId { expected, found } => write!(
                f,
                "unexpected model id {found:#06x} (expected {expected:#06x})"
            ),
            InitFailureReason::BootTimeout { timeout_ms } => {
                write!(f, "firmware not booted after {timeout_ms}ms")
            }
            InitFailureReason::AddressAlreadyAssigned { address } => {
                write!(f, "address already assigned ({address:#04x})")
            }
            InitFailureReason::Bus(e) => write!(f, "{e}"),
        }
    }
}

// ── Fixture faults ────────────────────────────────────────────────────────────

/// Fatal fault of the fixture control loop.
///
/// None of these are retried.  The user-visible behaviour is a full restart,
/// after which bring-up is attempted again from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    /// A sensor failed its bring-up handshake or configuration.
    #[error("sensor {sensor} failed bring-up: {reason}")]
    InitFailure {
        sensor: usize,
        reason: InitFailureReason,
    },

    /// A continuous read exceeded the configured timeout (bus error,
    /// disconnected sensor, stalled ranging).
    #[error("sensor {sensor} at {address:#04x} timed out after {timeout_ms}ms")]
    ReadTimeout {
        sensor: usize,
        address: u8,
        timeout_ms: u64,
    },

    /// The number of reset lines handed to the array does not match the
    /// configured sensor count.
    #[error("{lines} reset line(s) supplied for {sensors} sensor(s)")]
    ResetLinesMismatch { sensors: usize, lines: usize },

    /// The idle task stopped answering the preemption handshake.
    #[error("idle task is gone, preemption handshake failed")]
    IdleTaskGone,

    /// The monitor task ended without reporting a fault (panicked).
    #[error("monitor task ended unexpectedly")]
    MonitorTaskGone,
}

impl FixtureError {
    /// Index of the sensor involved, if the fault is sensor-specific.
    pub fn sensor(&self) -> Option<usize> {
        match self {
            FixtureError::InitFailure { sensor, .. } | FixtureError::ReadTimeout { sensor, .. } => {
                Some(*sensor)
            }
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
