//! Fixture configuration loading and validation.
//!
//! Every value the firmware used to hard-code lives here.  Defaults match the
//! shipped fixture, so an empty file (or no file at all) is a valid
//! configuration for a single-sensor unit.
//!
//! The expected YAML structure is:
//! ```yaml
//! sensors:
//!   count: 1
//!   reset_lines: [4, 5, 2, 17, 0, 16]
//!   default_address: 0x29
//!   base_address: 0x2A
//!   read_timeout_ms: 500
//!   bringup_timeout_ms: 500
//!   power_up_delay_ms: 10
//!   sample_interval_ms: 50
//!   roi_center: 199
//!   roi_size: { width: 10, height: 10 }
//! trigger:
//!   threshold_mm: 10
//!   debounce_reads: 2
//! output:
//!   pwm_channel: 0
//!   pwm_frequency_hz: 5000
//!   pwm_resolution_bits: 8
//!   pin: 19
//! bus:
//!   clock_hz: 100000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Highest 7-bit bus address.
const MAX_BUS_ADDRESS: u16 = 0x7F;

/// Smallest and largest ROI edge the sensor accepts, in SPADs.
const ROI_MIN: u8 = 4;
const ROI_MAX: u8 = 16;

// ── Validation errors ─────────────────────────────────────────────────────────

/// Why a [`FixtureConfig`] was rejected by [`FixtureConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("sensor count must be at least 1")]
    NoSensors,

    #[error("{count} sensors configured but only {lines} reset line(s) listed")]
    NotEnoughResetLines { count: usize, lines: usize },

    #[error("address range {base:#04x}..={last:#04x} does not fit in 7 bits")]
    AddressRangeOverflow { base: u8, last: u16 },

    #[error("default address {default:#04x} lies inside the assigned range {base:#04x}..={last:#04x}")]
    DefaultAddressInRange { default: u8, base: u8, last: u8 },

    #[error("ROI size {width}x{height} outside 4..=16")]
    RoiSizeOutOfRange { width: u8, height: u8 },

    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },

    #[error("PWM resolution {bits} bits outside 1..=16")]
    PwmResolution { bits: u8 },
}

// ── Sections ──────────────────────────────────────────────────────────────────

/// Region-of-interest edge lengths, in SPADs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RoiSize {
    pub width: u8,
    pub height: u8,
}

/// Sensor array wiring and ranging parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Number of sensors actually fitted.
    pub count: usize,
    /// Reset (XSHUT) line identifiers in bring-up order; may list more lines
    /// than `count`, extra entries are unused.
    pub reset_lines: Vec<u8>,
    /// Address every sensor answers at after reset.
    pub default_address: u8,
    /// Sensor `i` is moved to `base_address + i`.
    pub base_address: u8,
    pub read_timeout_ms: u64,
    /// Upper bound on waiting for sensor firmware boot during bring-up.
    pub bringup_timeout_ms: u64,
    /// Settling time after releasing a reset line, and reset hold time.
    pub power_up_delay_ms: u64,
    /// Continuous-mode inter-measurement period.
    pub sample_interval_ms: u32,
    /// ROI centre SPAD number (199 is the optical centre).
    pub roi_center: u8,
    pub roi_size: RoiSize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            count: 1,
            reset_lines: vec![4, 5, 2, 17, 0, 16],
            default_address: 0x29,
            base_address: 0x2A,
            read_timeout_ms: 500,
            bringup_timeout_ms: 500,
            power_up_delay_ms: 10,
            sample_interval_ms: 50,
            roi_center: 199,
            roi_size: RoiSize {
                width: 10,
                height: 10,
            },
        }
    }
}

impl SensorConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn bringup_timeout(&self) -> Duration {
        Duration::from_millis(self.bringup_timeout_ms)
    }

    pub fn power_up_delay(&self) -> Duration {
        Duration::from_millis(self.power_up_delay_ms)
    }

    /// Address assigned to sensor `index` during bring-up.
    pub fn address_of(&self, index: usize) -> u8 {
        self.base_address.wrapping_add(index as u8)
    }
}

/// Proximity trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// A read strictly below this distance counts as "someone is close".
    pub threshold_mm: u16,
    /// Consecutive qualifying reads on one sensor needed to trigger.
    pub debounce_reads: u8,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            threshold_mm: 10,
            debounce_reads: 2,
        }
    }
}

/// PWM output used for the light.  Only `pwm_resolution_bits` matters to the
/// core; the rest is consumed by the platform setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub pwm_channel: u8,
    pub pwm_frequency_hz: u32,
    pub pwm_resolution_bits: u8,
    pub pin: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pwm_channel: 0,
            pwm_frequency_hz: 5_000,
            pwm_resolution_bits: 8,
            pin: 19,
        }
    }
}

impl OutputConfig {
    /// Highest duty value representable at the configured resolution.
    pub fn max_level(&self) -> u16 {
        let bits = self.pwm_resolution_bits.clamp(1, 16) as u32;
        ((1u32 << bits) - 1) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub clock_hz: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { clock_hz: 100_000 }
    }
}

// ── FixtureConfig ─────────────────────────────────────────────────────────────

/// Complete fixture configuration.  Read-only once the fixture starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub sensors: SensorConfig,
    pub trigger: TriggerConfig,
    pub output: OutputConfig,
    pub bus: BusConfig,
}

impl FixtureConfig {
    /// Parses `path` into a configuration.  The result is **not** validated;
    /// call [`validate`](Self::validate) before handing it to the fixture.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading fixture configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))
    }

    /// Parses a YAML document.  An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: FixtureConfig = serde_yaml::from_str(content)?;
        debug!(
            sensors = cfg.sensors.count,
            threshold_mm = cfg.trigger.threshold_mm,
            "parsed fixture configuration"
        );
        Ok(cfg)
    }

    /// Checks every cross-field constraint the bring-up sequence relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sensors;

        if s.count == 0 {
            return Err(ConfigError::NoSensors);
        }
        if s.count > s.reset_lines.len() {
            return Err(ConfigError::NotEnoughResetLines {
                count: s.count,
                lines: s.reset_lines.len(),
            });
        }

        let last = s.base_address as u16 + s.count as u16 - 1;
        if last > MAX_BUS_ADDRESS {
            return Err(ConfigError::AddressRangeOverflow {
                base: s.base_address,
                last,
            });
        }
        // A sensor moved onto the default address would collide with the
        // next one released.
        if (s.base_address as u16..=last).contains(&(s.default_address as u16)) {
            return Err(ConfigError::DefaultAddressInRange {
                default: s.default_address,
                base: s.base_address,
                last: last as u8,
            });
        }

        let roi = s.roi_size;
        if !(ROI_MIN..=ROI_MAX).contains(&roi.width) || !(ROI_MIN..=ROI_MAX).contains(&roi.height)
        {
            return Err(ConfigError::RoiSizeOutOfRange {
                width: roi.width,
                height: roi.height,
            });
        }

        for (field, value) in [
            ("sensors.read_timeout_ms", s.read_timeout_ms),
            ("sensors.bringup_timeout_ms", s.bringup_timeout_ms),
            ("sensors.sample_interval_ms", s.sample_interval_ms as u64),
            ("trigger.threshold_mm", self.trigger.threshold_mm as u64),
            ("trigger.debounce_reads", self.trigger.debounce_reads as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        let bits = self.output.pwm_resolution_bits;
        if !(1..=16).contains(&bits) {
            return Err(ConfigError::PwmResolution { bits });
        }

        Ok(())
    }

    /// Reset lines actually in use, in bring-up order.
    pub fn active_reset_lines(&self) -> &[u8] {
        let n = self.sensors.count.min(self.sensors.reset_lines.len());
        &self.sensors.reset_lines[..n]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn defaults_match_shipped_fixture() {
        let cfg = FixtureConfig::default();
        assert_eq!(cfg.sensors.count, 1);
        assert_eq!(cfg.sensors.reset_lines, vec![4, 5, 2, 17, 0, 16]);
        assert_eq!(cfg.sensors.default_address, 0x29);
        assert_eq!(cfg.sensors.base_address, 0x2A);
        assert_eq!(cfg.sensors.read_timeout_ms, 500);
        assert_eq!(cfg.sensors.sample_interval_ms, 50);
        assert_eq!(cfg.sensors.roi_center, 199);
        assert_eq!(cfg.trigger.threshold_mm, 10);
        assert_eq!(cfg.trigger.debounce_reads, 2);
        assert_eq!(cfg.output.max_level(), 255);
        assert_eq!(cfg.bus.clock_hz, 100_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn address_of_is_base_plus_index() {
        let s = SensorConfig::default();
        assert_eq!(s.address_of(0), 0x2A);
        assert_eq!(s.address_of(5), 0x2F);
    }

    #[test]
    fn max_level_follows_resolution() {
        let mut out = OutputConfig::default();
        out.pwm_resolution_bits = 10;
        assert_eq!(out.max_level(), 1023);
        out.pwm_resolution_bits = 16;
        assert_eq!(out.max_level(), u16::MAX);
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
sensors:
  count: 3
  reset_lines: [4, 5, 2]
  default_address: 0x29
  base_address: 0x30
  read_timeout_ms: 250
  bringup_timeout_ms: 100
  power_up_delay_ms: 12
  sample_interval_ms: 33
  roi_center: 167
  roi_size: { width: 8, height: 16 }
trigger:
  threshold_mm: 950
  debounce_reads: 3
output:
  pwm_channel: 1
  pwm_frequency_hz: 1000
  pwm_resolution_bits: 10
  pin: 21
bus:
  clock_hz: 400000
"#;
        let f = yaml_tempfile(yaml);
        let cfg = FixtureConfig::load_from_file(f.path()).unwrap();

        assert_eq!(cfg.sensors.count, 3);
        assert_eq!(cfg.sensors.base_address, 0x30);
        assert_eq!(cfg.sensors.read_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.sensors.power_up_delay(), Duration::from_millis(12));
        assert_eq!(
            cfg.sensors.roi_size,
            RoiSize {
                width: 8,
                height: 16
            }
        );
        assert_eq!(cfg.trigger.threshold_mm, 950);
        assert_eq!(cfg.trigger.debounce_reads, 3);
        assert_eq!(cfg.output.max_level(), 1023);
        assert_eq!(cfg.bus.clock_hz, 400_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "trigger:\n  threshold_mm: 950\n";
        let cfg = FixtureConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.trigger.threshold_mm, 950);
        assert_eq!(cfg.trigger.debounce_reads, 2);
        assert_eq!(cfg.sensors, SensorConfig::default());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(FixtureConfig::from_yaml("  \n").unwrap(), FixtureConfig::default());
    }

    #[test]
    fn missing_file_returns_error() {
        let result = FixtureConfig::load_from_file(Path::new("/nonexistent/path/fixture.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(FixtureConfig::load_from_file(f.path()).is_err());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn zero_sensors_rejected() {
        let mut cfg = FixtureConfig::default();
        cfg.sensors.count = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::NoSensors));
    }

    #[test]
    fn more_sensors_than_reset_lines_rejected() {
        let mut cfg = FixtureConfig::default();
        cfg.sensors.count = 7;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NotEnoughResetLines { count: 7, lines: 6 })
        );
    }

    #[test]
    fn address_range_past_seven_bits_rejected() {
        let mut cfg = FixtureConfig::default();
        cfg.sensors.count = 2;
        cfg.sensors.base_address = 0x7F;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::AddressRangeOverflow { last: 0x80, .. })
        ));
    }

    #[test]
    fn default_address_inside_range_rejected() {
        let mut cfg = FixtureConfig::default();
        cfg.sensors.count = 3;
        cfg.sensors.base_address = 0x28;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DefaultAddressInRange { default: 0x29, .. })
        ));
    }

    #[test]
    fn roi_size_bounds_enforced() {
        let mut cfg = FixtureConfig::default();
        cfg.sensors.roi_size = RoiSize {
            width: 3,
            height: 10,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RoiSizeOutOfRange { .. })
        ));
    }

    #[test]
    fn zero_threshold_rejected() {
        let mut cfg = FixtureConfig::default();
        cfg.trigger.threshold_mm = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Zero {
                field: "trigger.threshold_mm"
            })
        );
    }

    #[test]
    fn active_reset_lines_truncated_to_count() {
        let mut cfg = FixtureConfig::default();
        cfg.sensors.count = 2;
        assert_eq!(cfg.active_reset_lines(), &[4, 5]);
    }
}
