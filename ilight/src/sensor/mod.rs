/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Sensor driver adapter for one VL53L1X time-of-flight sensor.
//!
//! A [`SensorHandle`] owns the device's reset line and everything the fixture
//! knows about it (address, timeout, ROI, last reading, fault flag).  The bus
//! is shared by all sensors, so every bus-touching operation borrows it from
//! the caller instead of owning it:
//!
//! ```text
//! reset() ─► enable_and_init() ─► set_address() ─► start_continuous() ─► read()*
//! ```
//!
//! # Fault model
//! [`read`](SensorHandle::read) never returns an error.  If no sample becomes
//! ready within the configured timeout it raises the sticky
//! [`timed_out`](SensorHandle::timed_out) flag and returns `0`.  Bus errors
//! while polling count as "not ready yet", so an unplugged sensor surfaces as
//! a timeout as well.

pub mod registers;

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::{RoiSize, SensorConfig};
use crate::error::{BusError, InitFailureReason};
use crate::hw::{I2cBus, ResetLine};

use registers::*;

/// Pause between two data-ready polls while waiting for a sample.
const DATA_READY_POLL: Duration = Duration::from_millis(1);

/// Pause between two boot-status polls during bring-up.
const BOOT_POLL: Duration = Duration::from_millis(1);

// ── SensorHandle ──────────────────────────────────────────────────────────────

/// One distance sensor on the shared bus.
///
/// Identity is the array index.  Created once during bring-up and kept for
/// the lifetime of the process.
#[derive(Debug)]
pub struct SensorHandle<R> {
    index: usize,
    reset_line: R,

    /// Address the device answers at after a reset.
    default_address: u8,
    /// Address we currently talk to.
    address: u8,
    address_assigned: bool,

    timeout: Duration,
    roi_center: u8,
    roi_size: Option<RoiSize>,

    /// Oscillator calibration read during init; scales the ranging period.
    osc_calibration: u16,
    /// Continuous-mode interval, `Some` once ranging has been started.
    interval_ms: Option<u32>,

    last_distance_mm: u16,
    timed_out: bool,
}

impl<R: ResetLine> SensorHandle<R> {
    pub fn new(index: usize, reset_line: R, default_address: u8) -> Self {
        Self {
            index,
            reset_line,
            default_address,
            address: default_address,
            address_assigned: false,
            timeout: Duration::ZERO,
            roi_center: 0,
            roi_size: None,
            osc_calibration: 0,
            interval_ms: None,
            last_distance_mm: 0,
            timed_out: false,
        }
    }

    // ── Bring-up ──────────────────────────────────────────────────────────────

    /// Drive the enable line inactive.  The device forgets its address and
    /// stops ranging.
    pub fn reset(&mut self) {
        self.reset_line.set_low();
        self.address = self.default_address;
        self.address_assigned = false;
        self.interval_ms = None;
    }

    /// Release the enable line, wait for power-up, identify the device and
    /// configure timeout and region of interest.
    ///
    /// Must only be called while every other sensor still sitting at the
    /// default address is held in reset.
    pub async fn enable_and_init<B: I2cBus>(
        &mut self,
        bus: &mut B,
        cfg: &SensorConfig,
    ) -> Result<(), InitFailureReason> {
        self.reset_line.release();
        sleep(cfg.power_up_delay()).await;

        let model = read_u16(bus, self.address, IDENTIFICATION_MODEL_ID)
            .map_err(InitFailureReason::NoResponse)?;
        if model != MODEL_ID {
            return Err(InitFailureReason::UnexpectedModelId {
                expected: MODEL_ID,
                found: model,
            });
        }

        self.wait_for_boot(bus, cfg.bringup_timeout()).await?;

        self.osc_calibration = read_u16(bus, self.address, RESULT_OSC_CALIBRATE_VAL)
            .map_err(InitFailureReason::Bus)?;

        self.timeout = cfg.read_timeout();
        self.roi_center = cfg.roi_center;
        self.roi_size = Some(cfg.roi_size);
        write_u8(bus, self.address, ROI_CONFIG_USER_ROI_CENTRE_SPAD, cfg.roi_center)
            .map_err(InitFailureReason::Bus)?;
        write_u8(
            bus,
            self.address,
            ROI_CONFIG_USER_ROI_REQUESTED_GLOBAL_XY_SIZE,
            roi_size_byte(cfg.roi_size.width, cfg.roi_size.height),
        )
        .map_err(InitFailureReason::Bus)?;

        debug!(
            sensor = self.index,
            address = self.address,
            osc_calibration = self.osc_calibration,
            "sensor identified and configured"
        );
        Ok(())
    }

    async fn wait_for_boot<B: I2cBus>(
        &mut self,
        bus: &mut B,
        limit: Duration,
    ) -> Result<(), InitFailureReason> {
        let start = Instant::now();
        loop {
            if let Ok(status) = read_u8(bus, self.address, FIRMWARE_SYSTEM_STATUS) {
                if status & 0x01 == 0x01 {
                    return Ok(());
                }
            }
            if start.elapsed() > limit {
                return Err(InitFailureReason::BootTimeout {
                    timeout_ms: limit.as_millis() as u64,
                });
            }
            sleep(BOOT_POLL).await;
        }
    }

    /// Move the device to `new_address` (7-bit).  Allowed once per reset.
    pub fn set_address<B: I2cBus>(
        &mut self,
        bus: &mut B,
        new_address: u8,
    ) -> Result<(), InitFailureReason> {
        if self.address_assigned {
            return Err(InitFailureReason::AddressAlreadyAssigned {
                address: self.address,
            });
        }
        let new_address = new_address & 0x7F;
        write_u8(bus, self.address, I2C_SLAVE_DEVICE_ADDRESS, new_address)
            .map_err(InitFailureReason::Bus)?;
        self.address = new_address;
        self.address_assigned = true;
        Ok(())
    }

    /// Start autonomous ranging, one sample every `interval_ms`.
    pub fn start_continuous<B: I2cBus>(
        &mut self,
        bus: &mut B,
        interval_ms: u32,
    ) -> Result<(), InitFailureReason> {
        let period = interval_ms.saturating_mul(self.osc_calibration.max(1) as u32);
        write_u32(bus, self.address, SYSTEM_INTERMEASUREMENT_PERIOD, period)
            .map_err(InitFailureReason::Bus)?;
        write_u8(bus, self.address, SYSTEM_INTERRUPT_CLEAR, 0x01)
            .map_err(InitFailureReason::Bus)?;
        write_u8(bus, self.address, SYSTEM_MODE_START, MODE_START_TIMED)
            .map_err(InitFailureReason::Bus)?;
        self.interval_ms = Some(interval_ms);
        Ok(())
    }

    // ── Steady state ──────────────────────────────────────────────────────────

    /// Most recent completed sample, in millimetres.
    ///
    /// Waits (yielding) for the next sample for at most the configured
    /// timeout.  On expiry the sticky fault flag is raised and `0` returned.
    pub async fn read<B: I2cBus>(&mut self, bus: &mut B) -> u16 {
        let start = Instant::now();
        loop {
            match read_u8(bus, self.address, GPIO_TIO_HV_STATUS) {
                // Interrupt output is active low: bit 0 clear means "ready".
                Ok(status) if status & 0x01 == 0 => break,
                Ok(_) => {}
                Err(e) => debug!(sensor = self.index, error = %e, "data-ready poll failed"),
            }
            if start.elapsed() > self.timeout {
                return self.fail("no sample within timeout");
            }
            sleep(DATA_READY_POLL).await;
        }

        let distance = match read_u16(bus, self.address, RESULT_FINAL_CROSSTALK_CORRECTED_RANGE_MM_SD0)
        {
            Ok(d) => d,
            Err(_) => return self.fail("range result read failed"),
        };
        if write_u8(bus, self.address, SYSTEM_INTERRUPT_CLEAR, 0x01).is_err() {
            return self.fail("interrupt clear failed");
        }

        self.last_distance_mm = distance;
        distance
    }

    fn fail(&mut self, what: &str) -> u16 {
        warn!(
            sensor = self.index,
            address = self.address,
            timeout_ms = self.timeout.as_millis() as u64,
            "{what}"
        );
        self.timed_out = true;
        0
    }

    /// Sticky: `true` once any read has failed.  Never cleared.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn roi(&self) -> (u8, Option<RoiSize>) {
        (self.roi_center, self.roi_size)
    }

    pub fn sample_interval_ms(&self) -> Option<u32> {
        self.interval_ms
    }

    pub fn is_ranging(&self) -> bool {
        self.interval_ms.is_some()
    }

    pub fn last_distance_mm(&self) -> u16 {
        self.last_distance_mm
    }
}

// ── Register access ───────────────────────────────────────────────────────────

fn read_u8<B: I2cBus>(bus: &mut B, address: u8, reg: u16) -> Result<u8, BusError> {
    let mut buf = [0u8; 1];
    bus.write_read(address, &reg.to_be_bytes(), &mut buf)?;
    Ok(buf[0])
}

fn read_u16<B: I2cBus>(bus: &mut B, address: u8, reg: u16) -> Result<u16, BusError> {
    let mut buf = [0u8; 2];
    bus.write_read(address, &reg.to_be_bytes(), &mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn write_u8<B: I2cBus>(bus: &mut B, address: u8, reg: u16, value: u8) -> Result<(), BusError> {
    bus.write(address, &frame(reg, &[value]))
}

fn write_u32<B: I2cBus>(bus: &mut B, address: u8, reg: u16, value: u32) -> Result<(), BusError> {
    bus.write(address, &frame(reg, &value.to_be_bytes()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
