/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Hardware collaborator interfaces.
//!
//! The fixture core never touches peripherals directly.  Everything it needs
//! from the board is expressed by the four traits below:
//!
//! ```text
//! SensorArray ──► I2cBus      (shared multi-drop bus, fixed clock)
//!             └─► ResetLine   (one XSHUT line per sensor)
//! Actuator    ──► PwmChannel  (fixed frequency / resolution duty output)
//! Monitor     ──► Restart     (irreversible system reset on fatal faults)
//! ```
//!
//! Clock, pin-mux and PWM timer setup happen once, outside the core, before
//! [`fixture::run`](crate::fixture::run) is called.

use crate::error::{BusError, FixtureError};

// ── Bus transport ─────────────────────────────────────────────────────────────

/// Address-based transfers on the shared sensor bus.
///
/// Addresses are 7-bit.  Implementations must report a missing acknowledge as
/// [`BusError::Nack`] so the sensor driver can tell an absent device from a
/// transport failure.
pub trait I2cBus: Send {
    /// Write `bytes` to the device at `address`.
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError>;

    /// Write `bytes`, then read `buf.len()` bytes back in the same transaction.
    fn write_read(&mut self, address: u8, bytes: &[u8], buf: &mut [u8])
        -> Result<(), BusError>;
}

// ── Sensor reset (XSHUT) ──────────────────────────────────────────────────────

/// Enable line of a single sensor.
///
/// Low holds the device in reset (it does not answer on the bus at all);
/// released lets it boot at its default address.
pub trait ResetLine: Send {
    /// Drive the line low (device held in reset).
    fn set_low(&mut self);

    /// Stop driving the line so the device's pull-up enables it.
    fn release(&mut self);
}

// ── Actuator output ───────────────────────────────────────────────────────────

/// One PWM output channel.
///
/// The only operation the core performs is "set duty cycle to X".  The duty
/// value is already clamped to the configured resolution by the caller.
pub trait PwmChannel: Send {
    fn set_duty(&mut self, duty: u16);
}

// ── Restart primitive ─────────────────────────────────────────────────────────

/// Irreversible, immediate system reset.
///
/// On hardware this never returns.  Host implementations (the simulator, the
/// tests) record the request and return; the caller stops all activity
/// afterwards either way.
pub trait Restart: Send + Sync {
    fn restart(&self, cause: &FixtureError);
}
