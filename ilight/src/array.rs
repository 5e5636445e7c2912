/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Sensor array manager: bring-up sequencing and steady-state polling.
//!
//! All sensors boot at the same default bus address, so they have to be woken
//! and re-addressed one at a time:
//!
//! ```text
//! all reset lines LOW ── hold ──┐
//!                               ▼
//!   for i in 0..N:  release(i) ─► init(i) ─► set_address(base+i) ─► start_continuous(i)
//!                   (every j > i is still held LOW, so only i answers the default address)
//! ```
//!
//! Any failure aborts the whole bring-up; there is no partial-array mode.

use tracing::{debug, info};

use crate::config::SensorConfig;
use crate::error::FixtureError;
use crate::hw::{I2cBus, ResetLine};
use crate::sensor::SensorHandle;

// ── SensorArray ───────────────────────────────────────────────────────────────

/// The bus plus every sensor on it, in bring-up order.
///
/// Only exists fully brought up: the sole constructor is
/// [`bring_up`](Self::bring_up).
#[derive(Debug)]
pub struct SensorArray<B, R> {
    bus: B,
    sensors: Vec<SensorHandle<R>>,
    cfg: SensorConfig,
}

impl<B: I2cBus, R: ResetLine> SensorArray<B, R> {
    /// Reset, initialise, address and start every sensor, strictly one after
    /// the other.
    ///
    /// `reset_lines[i]` must be wired to sensor `i`; exactly `cfg.count`
    /// lines are expected.
    ///
    /// # Errors
    /// [`FixtureError::ResetLinesMismatch`] if the line count is wrong,
    /// [`FixtureError::InitFailure`] for the first sensor that fails.
    pub async fn bring_up(
        mut bus: B,
        reset_lines: Vec<R>,
        cfg: &SensorConfig,
    ) -> Result<Self, FixtureError> {
        if reset_lines.len() != cfg.count {
            return Err(FixtureError::ResetLinesMismatch {
                sensors: cfg.count,
                lines: reset_lines.len(),
            });
        }

        info!(sensors = cfg.count, base_address = cfg.base_address, "sensor bring-up");

        let mut sensors: Vec<SensorHandle<R>> = reset_lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| SensorHandle::new(i, line, cfg.default_address))
            .collect();

        // ── Step 1: power-on reset, all at once ───────────────────────────────
        for sensor in sensors.iter_mut() {
            sensor.reset();
        }
        tokio::time::sleep(cfg.power_up_delay()).await;

        // ── Step 2: one device at a time ──────────────────────────────────────
        for sensor in sensors.iter_mut() {
            let index = sensor.index();
            let fail = |reason| FixtureError::InitFailure {
                sensor: index,
                reason,
            };

            sensor.enable_and_init(&mut bus, cfg).await.map_err(fail)?;
            sensor
                .set_address(&mut bus, cfg.address_of(index))
                .map_err(fail)?;
            sensor
                .start_continuous(&mut bus, cfg.sample_interval_ms)
                .map_err(fail)?;

            debug!(
                sensor = index,
                address = sensor.address(),
                interval_ms = cfg.sample_interval_ms,
                "sensor ranging"
            );
        }

        info!(addresses = ?sensors.iter().map(|s| s.address()).collect::<Vec<_>>(), "bring-up complete");

        Ok(Self {
            bus,
            sensors,
            cfg: cfg.clone(),
        })
    }

    // ── Steady state ──────────────────────────────────────────────────────────

    /// Read every sensor once, in index order.
    ///
    /// Stops at the first sensor whose sticky fault flag is set and returns
    /// [`FixtureError::ReadTimeout`] for it; readings after it are not taken.
    pub async fn poll_all(&mut self) -> Result<Vec<u16>, FixtureError> {
        let mut distances = Vec::with_capacity(self.sensors.len());
        for sensor in self.sensors.iter_mut() {
            let distance = sensor.read(&mut self.bus).await;
            if sensor.timed_out() {
                return Err(FixtureError::ReadTimeout {
                    sensor: sensor.index(),
                    address: sensor.address(),
                    timeout_ms: self.cfg.read_timeout_ms,
                });
            }
            debug!(sensor = sensor.index(), distance_mm = distance, "reading");
            distances.push(distance);
        }
        Ok(distances)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn sensor(&self, index: usize) -> Option<&SensorHandle<R>> {
        self.sensors.get(index)
    }

    pub fn addresses(&self) -> Vec<u8> {
        self.sensors.iter().map(|s| s.address()).collect()
    }

    pub fn is_ranging(&self) -> bool {
        self.sensors.iter().all(|s| s.is_ranging())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
