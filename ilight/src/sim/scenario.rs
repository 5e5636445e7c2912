/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! YAML scenarios for the simulated fixture.
//!
//! ```yaml
//! sensors:
//!   - script:
//!       - { distance_mm: 1500, for_ms: 12000 }
//!       - { distance_mm: 5, for_ms: 400 }
//!   - script:
//!       - { distance_mm: 900, for_ms: 1000 }
//!     stall_after_ms: 60000      # simulated cable pull
//!   - fail_init: true            # wrong model id, bring-up fails
//! ```
//!
//! Sensors not listed report a constant far distance.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use super::{CountingRestart, DistanceScript, SimBus, SimDevice, SimPwm, SimResetLine};
use crate::config::FixtureConfig;

/// Model id reported by a sensor configured with `fail_init`.
const WRONG_MODEL_ID: u16 = 0x0000;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScriptSegment {
    pub distance_mm: u16,
    pub for_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorScenario {
    pub script: Vec<ScriptSegment>,
    pub stall_after_ms: Option<u64>,
    pub fail_init: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub sensors: Vec<SensorScenario>,
}

/// Everything [`fixture::run`](crate::fixture::run) needs, simulated.
pub struct SimHardware {
    pub bus: SimBus,
    pub reset_lines: Vec<SimResetLine>,
    pub pwm: SimPwm,
    pub restart: Arc<CountingRestart>,
}

impl Scenario {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading simulation scenario from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open scenario file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))
    }

    /// Demo used when no scenario file is given: someone walks up to
    /// sensor 0 every 20 seconds.
    pub fn demo() -> Self {
        Self {
            sensors: vec![SensorScenario {
                script: vec![
                    ScriptSegment {
                        distance_mm: 1_500,
                        for_ms: 20_000,
                    },
                    ScriptSegment {
                        distance_mm: 5,
                        for_ms: 500,
                    },
                ],
                ..Default::default()
            }],
        }
    }

    /// Fresh simulated hardware for one boot of the fixture.
    pub fn build(&self, config: &FixtureConfig) -> SimHardware {
        let devices = (0..config.sensors.count)
            .map(|i| match self.sensors.get(i) {
                Some(s) => s.device(),
                None => SimDevice::new(),
            })
            .collect();
        let bus = SimBus::new(devices);
        let reset_lines = bus.reset_lines();

        info!(
            channel = config.output.pwm_channel,
            frequency_hz = config.output.pwm_frequency_hz,
            resolution_bits = config.output.pwm_resolution_bits,
            pin = config.output.pin,
            bus_clock_hz = config.bus.clock_hz,
            "simulated peripherals ready"
        );

        SimHardware {
            bus,
            reset_lines,
            pwm: SimPwm::logging(config.output.pwm_channel),
            restart: Arc::new(CountingRestart::new()),
        }
    }
}

impl SensorScenario {
    fn device(&self) -> SimDevice {
        let mut dev = SimDevice::new();
        if !self.script.is_empty() {
            dev = dev.with_script(DistanceScript {
                segments: self
                    .script
                    .iter()
                    .map(|s| (s.distance_mm, Duration::from_millis(s.for_ms)))
                    .collect(),
            });
        }
        if let Some(ms) = self.stall_after_ms {
            dev = dev.with_stall_after(Duration::from_millis(ms));
        }
        if self.fail_init {
            dev = dev.with_model_id(WRONG_MODEL_ID);
        }
        dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_yaml() {
        let yaml = r#"
sensors:
  - script:
      - { distance_mm: 1500, for_ms: 12000 }
      - { distance_mm: 5, for_ms: 400 }
  - stall_after_ms: 60000
  - fail_init: true
"#;
        let sc: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(sc.sensors.len(), 3);
        assert_eq!(sc.sensors[0].script.len(), 2);
        assert_eq!(sc.sensors[1].stall_after_ms, Some(60_000));
        assert!(sc.sensors[2].fail_init);
    }

    #[test]
    fn build_creates_one_device_per_configured_sensor() {
        let mut cfg = FixtureConfig::default();
        cfg.sensors.count = 3;
        let hw = Scenario {
            sensors: vec![SensorScenario {
                fail_init: true,
                ..Default::default()
            }],
        }
        .build(&cfg);

        assert_eq!(hw.reset_lines.len(), 3);
        assert_eq!(hw.bus.device(0).model_id, WRONG_MODEL_ID);
        assert_eq!(hw.bus.device(2).model_id, crate::sensor::registers::MODEL_ID);
        assert_eq!(hw.restart.count(), 0);
    }

    #[test]
    fn max_length_segments_load_and_play() {
        let yaml = r#"
sensors:
  - script:
      - { distance_mm: 40, for_ms: 18446744073709551615 }
      - { distance_mm: 3, for_ms: 18446744073709551615 }
"#;
        let sc: Scenario = serde_yaml::from_str(yaml).unwrap();
        let script = sc.sensors[0].device().script.unwrap();
        assert_eq!(script.distance_at(Duration::from_secs(3_600)), Some(40));
        assert_eq!(script.distance_at(Duration::from_millis(u64::MAX)), Some(3));
    }

    #[test]
    fn demo_scripts_sensor_zero() {
        let demo = Scenario::demo();
        let dev = demo.sensors[0].device();
        let script = dev.script.unwrap();
        assert_eq!(script.distance_at(Duration::from_millis(20_100)), Some(5));
    }
}
