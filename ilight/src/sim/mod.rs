/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Simulated fixture hardware, NOT for production.
//!
//! Implements every collaborator trait from [`crate::hw`] on the host so the
//! fixture core can run without a board:
//!
//! * [`SimBus`]: one shared bus with any number of [`SimDevice`]s, each
//!   behind its own [`SimResetLine`].  Devices model the VL53L1X registers
//!   the driver touches, boot at the shared default address and detect
//!   address collisions.
//! * [`SimPwm`]: duty-cycle output that records `(time, duty)` samples or
//!   logs them.
//! * [`CountingRestart`]: restart primitive that counts and keeps causes.
//!
//! [`scenario`] turns a YAML description into a ready-to-run [`SimHardware`]
//! bundle for the `ilight` binary.

pub mod scenario;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::error::{BusError, FixtureError};
use crate::hw::{I2cBus, PwmChannel, ResetLine, Restart};
use crate::sensor::registers::*;

/// Address every simulated device boots at.
pub const DEFAULT_ADDRESS: u8 = 0x29;

/// Distance reported when nothing is scripted.
const FAR_AWAY_MM: u16 = 2_000;

// ── SimDevice ─────────────────────────────────────────────────────────────────

/// One scripted sample source entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimReading {
    Distance(u16),
    /// From this sample on the device stops producing data until
    /// [`SimDevice::resume`].
    Stall,
}

/// Distance that follows a looping timeline measured from ranging start.
#[derive(Debug, Clone, Default)]
pub struct DistanceScript {
    /// `(distance_mm, duration)` segments, played in order and looped.
    pub segments: Vec<(u16, Duration)>,
}

impl DistanceScript {
    pub fn distance_at(&self, elapsed: Duration) -> Option<u16> {
        // Nanoseconds as u128: huge scripted segments must not overflow.
        let total = self
            .segments
            .iter()
            .fold(0u128, |acc, (_, d)| acc.saturating_add(d.as_nanos()));
        if total == 0 {
            return None;
        }
        let mut t = elapsed.as_nanos() % total;
        for (distance, len) in &self.segments {
            let len = len.as_nanos();
            if t < len {
                return Some(*distance);
            }
            t -= len;
        }
        None
    }
}

/// State of one simulated VL53L1X.  Public fields are there for assertions.
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub model_id: u16,
    pub osc_calibration: u16,
    pub boot_delay: Duration,
    /// Answers on the bus at all (cable plugged in).
    pub connected: bool,

    /// Reset line released.
    pub enabled: bool,
    released_at: Option<Instant>,
    pub address: u8,

    pub roi_center: u8,
    pub roi_size: u8,
    pub intermeasurement_period: u32,
    pub ranging: bool,
    ranging_since: Option<Instant>,
    cycle_start: Option<Instant>,
    pub stalled: bool,
    pub stall_after: Option<Duration>,

    readings: VecDeque<SimReading>,
    pub script: Option<DistanceScript>,
    pub samples_delivered: usize,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDevice {
    pub fn new() -> Self {
        Self {
            model_id: MODEL_ID,
            osc_calibration: 1,
            boot_delay: Duration::ZERO,
            connected: true,
            enabled: false,
            released_at: None,
            address: DEFAULT_ADDRESS,
            roi_center: 0,
            roi_size: 0,
            intermeasurement_period: 0,
            ranging: false,
            ranging_since: None,
            cycle_start: None,
            stalled: false,
            stall_after: None,
            readings: VecDeque::new(),
            script: None,
            samples_delivered: 0,
        }
    }

    // ── Builders ──────────────────────────────────────────────────────────────

    pub fn with_model_id(mut self, id: u16) -> Self {
        self.model_id = id;
        self
    }

    pub fn with_osc_calibration(mut self, osc: u16) -> Self {
        self.osc_calibration = osc;
        self
    }

    pub fn with_boot_delay(mut self, delay: Duration) -> Self {
        self.boot_delay = delay;
        self
    }

    pub fn with_absent(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn with_readings(mut self, readings: impl IntoIterator<Item = SimReading>) -> Self {
        self.readings.extend(readings);
        self
    }

    pub fn with_script(mut self, script: DistanceScript) -> Self {
        self.script = Some(script);
        self
    }

    pub fn with_stall_after(mut self, after: Duration) -> Self {
        self.stall_after = Some(after);
        self
    }

    // ── Runtime manipulation ──────────────────────────────────────────────────

    pub fn push_reading(&mut self, reading: SimReading) {
        self.readings.push_back(reading);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn resume(&mut self) {
        self.stalled = false;
        self.stall_after = None;
    }

    // ── Register model ────────────────────────────────────────────────────────

    fn power_down(&mut self) {
        self.enabled = false;
        self.released_at = None;
        self.address = DEFAULT_ADDRESS;
        self.ranging = false;
        self.ranging_since = None;
        self.cycle_start = None;
        self.stalled = false;
    }

    fn power_up(&mut self, now: Instant) {
        if !self.enabled {
            self.enabled = true;
            self.released_at = Some(now);
        }
    }

    fn booted(&self, now: Instant) -> bool {
        self.released_at
            .map(|t| now.duration_since(t) >= self.boot_delay)
            .unwrap_or(false)
    }

    fn sample_interval(&self) -> Duration {
        let osc = self.osc_calibration.max(1) as u32;
        Duration::from_millis((self.intermeasurement_period / osc) as u64)
    }

    fn data_ready(&mut self, now: Instant) -> bool {
        if !self.ranging || self.stalled {
            return false;
        }
        if let (Some(after), Some(since)) = (self.stall_after, self.ranging_since) {
            if now.duration_since(since) >= after {
                self.stalled = true;
                return false;
            }
        }
        let ready = self
            .cycle_start
            .map(|t| now.duration_since(t) >= self.sample_interval())
            .unwrap_or(false);
        if ready && self.readings.front() == Some(&SimReading::Stall) {
            self.readings.pop_front();
            self.stalled = true;
            return false;
        }
        ready
    }

    fn next_distance(&mut self, now: Instant) -> u16 {
        self.samples_delivered += 1;
        if let Some(SimReading::Distance(d)) = self.readings.front().copied() {
            self.readings.pop_front();
            return d;
        }
        let elapsed = self
            .ranging_since
            .map(|t| now.duration_since(t))
            .unwrap_or_default();
        self.script
            .as_ref()
            .and_then(|s| s.distance_at(elapsed))
            .unwrap_or(FAR_AWAY_MM)
    }

    fn write_reg(&mut self, reg: u16, data: &[u8], now: Instant) {
        match reg {
            I2C_SLAVE_DEVICE_ADDRESS => {
                if let Some(a) = data.first() {
                    self.address = a & 0x7F;
                }
            }
            ROI_CONFIG_USER_ROI_CENTRE_SPAD => self.roi_center = data.first().copied().unwrap_or(0),
            ROI_CONFIG_USER_ROI_REQUESTED_GLOBAL_XY_SIZE => {
                self.roi_size = data.first().copied().unwrap_or(0)
            }
            SYSTEM_INTERMEASUREMENT_PERIOD => {
                let mut raw = [0u8; 4];
                let n = data.len().min(4);
                raw[4 - n..].copy_from_slice(&data[..n]);
                self.intermeasurement_period = u32::from_be_bytes(raw);
            }
            SYSTEM_INTERRUPT_CLEAR => self.cycle_start = Some(now),
            SYSTEM_MODE_START => {
                if data.first() == Some(&MODE_START_TIMED) {
                    self.ranging = true;
                    self.ranging_since = Some(now);
                    self.cycle_start = Some(now);
                } else {
                    self.ranging = false;
                }
            }
            _ => {}
        }
    }

    fn read_reg(&mut self, reg: u16, buf: &mut [u8], now: Instant) {
        let value: Vec<u8> = match reg {
            IDENTIFICATION_MODEL_ID => self.model_id.to_be_bytes().to_vec(),
            FIRMWARE_SYSTEM_STATUS => vec![u8::from(self.booted(now))],
            RESULT_OSC_CALIBRATE_VAL => self.osc_calibration.to_be_bytes().to_vec(),
            GPIO_TIO_HV_STATUS => vec![if self.data_ready(now) { 0x00 } else { 0x01 }],
            RESULT_FINAL_CROSSTALK_CORRECTED_RANGE_MM_SD0 => {
                self.next_distance(now).to_be_bytes().to_vec()
            }
            _ => Vec::new(),
        };
        buf.fill(0);
        let n = value.len().min(buf.len());
        buf[..n].copy_from_slice(&value[..n]);
    }
}

// ── SimBus ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BusState {
    devices: Vec<SimDevice>,
    collisions: Vec<(u8, usize)>,
    transactions: usize,
}

/// Shared simulated bus.  Clones refer to the same devices.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    state: Arc<Mutex<BusState>>,
}

impl SimBus {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                devices,
                ..Default::default()
            })),
        }
    }

    /// Reset line wired to device `index`.
    pub fn reset_line(&self, index: usize) -> SimResetLine {
        SimResetLine {
            state: Arc::clone(&self.state),
            index,
        }
    }

    /// Reset lines for all devices, in index order.
    pub fn reset_lines(&self) -> Vec<SimResetLine> {
        (0..self.state.lock().devices.len())
            .map(|i| self.reset_line(i))
            .collect()
    }

    /// Snapshot of device `index`.
    pub fn device(&self, index: usize) -> SimDevice {
        self.state.lock().devices[index].clone()
    }

    pub fn with_device<T>(&self, index: usize, f: impl FnOnce(&mut SimDevice) -> T) -> T {
        f(&mut self.state.lock().devices[index])
    }

    /// Every `(address, responders)` collision seen so far.
    pub fn collisions(&self) -> Vec<(u8, usize)> {
        self.state.lock().collisions.clone()
    }

    /// Number of transfers attempted on the bus.
    pub fn transactions(&self) -> usize {
        self.state.lock().transactions
    }

    fn transfer<T>(
        &mut self,
        address: u8,
        f: impl FnOnce(&mut SimDevice, Instant) -> T,
    ) -> Result<T, BusError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.transactions += 1;

        let responders: Vec<usize> = state
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.enabled && d.connected && d.address == address)
            .map(|(i, _)| i)
            .collect();

        match responders.as_slice() {
            [] => Err(BusError::Nack { address }),
            [only] => Ok(f(&mut state.devices[*only], now)),
            many => {
                let responders = many.len();
                warn!(address, responders, "simulated bus collision");
                state.collisions.push((address, responders));
                Err(BusError::Collision {
                    address,
                    responders,
                })
            }
        }
    }
}

fn split_register(bytes: &[u8]) -> Result<(u16, &[u8]), BusError> {
    match bytes {
        [hi, lo, rest @ ..] => Ok((u16::from_be_bytes([*hi, *lo]), rest)),
        _ => Err(BusError::Transport(format!(
            "register index needs 2 bytes, got {}",
            bytes.len()
        ))),
    }
}

impl I2cBus for SimBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        let (reg, data) = split_register(bytes)?;
        self.transfer(address, |dev, now| dev.write_reg(reg, data, now))
    }

    fn write_read(&mut self, address: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), BusError> {
        let (reg, _) = split_register(bytes)?;
        self.transfer(address, |dev, now| dev.read_reg(reg, buf, now))
    }
}

/// XSHUT line of one simulated device.
#[derive(Debug, Clone)]
pub struct SimResetLine {
    state: Arc<Mutex<BusState>>,
    index: usize,
}

impl ResetLine for SimResetLine {
    fn set_low(&mut self) {
        if let Some(dev) = self.state.lock().devices.get_mut(self.index) {
            dev.power_down();
        }
    }

    fn release(&mut self) {
        let now = Instant::now();
        if let Some(dev) = self.state.lock().devices.get_mut(self.index) {
            dev.power_up(now);
        }
    }
}

// ── SimPwm ────────────────────────────────────────────────────────────────────

/// One `set_duty` call as seen by the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmSample {
    pub at: Instant,
    pub duty: u16,
}

/// Simulated PWM channel.
#[derive(Debug, Clone)]
pub struct SimPwm {
    channel: u8,
    samples: Option<Arc<Mutex<Vec<PwmSample>>>>,
}

impl SimPwm {
    /// Keeps every sample; for tests.
    pub fn recording() -> Self {
        Self {
            channel: 0,
            samples: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Emits each duty change as a `trace` event and keeps nothing.
    pub fn logging(channel: u8) -> Self {
        Self {
            channel,
            samples: None,
        }
    }

    pub fn samples(&self) -> Vec<PwmSample> {
        self.samples
            .as_ref()
            .map(|s| s.lock().clone())
            .unwrap_or_default()
    }

    pub fn duties(&self) -> Vec<u16> {
        self.samples().iter().map(|s| s.duty).collect()
    }
}

impl PwmChannel for SimPwm {
    fn set_duty(&mut self, duty: u16) {
        trace!(channel = self.channel, duty, "pwm");
        if let Some(samples) = &self.samples {
            samples.lock().push(PwmSample {
                at: Instant::now(),
                duty,
            });
        }
    }
}

// ── CountingRestart ───────────────────────────────────────────────────────────

/// Restart primitive that records instead of resetting.
#[derive(Debug, Default)]
pub struct CountingRestart {
    count: AtomicUsize,
    causes: Mutex<Vec<FixtureError>>,
}

impl CountingRestart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn causes(&self) -> Vec<FixtureError> {
        self.causes.lock().clone()
    }
}

impl Restart for CountingRestart {
    fn restart(&self, cause: &FixtureError) {
        warn!(cause = %cause, "restart requested");
        self.count.fetch_add(1, Ordering::SeqCst);
        self.causes.lock().push(cause.clone());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_held_in_reset_does_not_answer() {
        let mut bus = SimBus::new(vec![SimDevice::new()]);
        let mut buf = [0u8; 2];
        let err = bus
            .write_read(DEFAULT_ADDRESS, &IDENTIFICATION_MODEL_ID.to_be_bytes(), &mut buf)
            .unwrap_err();
        assert_eq!(err, BusError::Nack { address: DEFAULT_ADDRESS });
    }

    #[test]
    fn two_released_devices_at_default_address_collide() {
        let mut bus = SimBus::new(vec![SimDevice::new(), SimDevice::new()]);
        for mut line in bus.reset_lines() {
            line.release();
        }
        let mut buf = [0u8; 2];
        let err = bus
            .write_read(DEFAULT_ADDRESS, &IDENTIFICATION_MODEL_ID.to_be_bytes(), &mut buf)
            .unwrap_err();
        assert_eq!(
            err,
            BusError::Collision {
                address: DEFAULT_ADDRESS,
                responders: 2
            }
        );
        assert_eq!(bus.collisions(), vec![(DEFAULT_ADDRESS, 2)]);
    }

    #[test]
    fn reset_restores_default_address() {
        let mut bus = SimBus::new(vec![SimDevice::new()]);
        let mut line = bus.reset_line(0);
        line.release();
        bus.write(DEFAULT_ADDRESS, &frame(I2C_SLAVE_DEVICE_ADDRESS, &[0x2A]))
            .unwrap();
        assert_eq!(bus.device(0).address, 0x2A);

        line.set_low();
        assert_eq!(bus.device(0).address, DEFAULT_ADDRESS);
        assert!(!bus.device(0).enabled);
    }

    #[test]
    fn short_register_index_is_transport_error() {
        let mut bus = SimBus::new(vec![SimDevice::new()]);
        assert!(matches!(
            bus.write(DEFAULT_ADDRESS, &[0x01]),
            Err(BusError::Transport(_))
        ));
    }

    #[test]
    fn script_loops_over_segments() {
        let script = DistanceScript {
            segments: vec![
                (1_500, Duration::from_millis(1_000)),
                (5, Duration::from_millis(200)),
            ],
        };
        assert_eq!(script.distance_at(Duration::ZERO), Some(1_500));
        assert_eq!(script.distance_at(Duration::from_millis(1_100)), Some(5));
        assert_eq!(script.distance_at(Duration::from_millis(1_200)), Some(1_500));
        assert_eq!(DistanceScript::default().distance_at(Duration::ZERO), None);
    }

    #[test]
    fn huge_segments_do_not_overflow() {
        let script = DistanceScript {
            segments: vec![
                (100, Duration::from_millis(u64::MAX)),
                (7, Duration::MAX),
                (9, Duration::MAX),
            ],
        };
        assert_eq!(script.distance_at(Duration::from_secs(1)), Some(100));
        assert_eq!(script.distance_at(Duration::from_millis(u64::MAX)), Some(7));
        assert_eq!(script.distance_at(Duration::MAX), Some(7));
    }

    #[test]
    fn counting_restart_keeps_causes() {
        let r = CountingRestart::new();
        r.restart(&FixtureError::IdleTaskGone);
        assert_eq!(r.count(), 1);
        assert_eq!(r.causes(), vec![FixtureError::IdleTaskGone]);
    }
}
