//! Node configuration
//!
//! Every threshold, calibration constant and timeout used by the decision
//! core lives here. `Default` yields the production values for the solar
//! node hardware; deployments on other boards should override the battery
//! calibration and thresholds after measuring their own hardware.

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::battery::Calibration;

/// Complete configuration for one node
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct NodeConfig<'a> {
    pub battery: BatteryConfig,
    pub thresholds: PowerThresholds,
    pub trend: TrendConfig,
    pub sleep: SleepConfig,
    pub sensors: SensorConfig,
    pub moisture: MoistureCalibration,
    pub upload: UploadConfig,
    pub network: NetworkConfig<'a>,
}

/// Battery sampling and calibration
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BatteryConfig {
    /// Raw ADC readings averaged per sample
    pub samples: u8,
    /// Settling delay between raw readings
    pub sample_delay_ms: u32,
    /// Readings at or below this count are treated as glitches
    pub valid_raw_min: u16,
    /// Readings at or above this count are treated as glitches
    pub valid_raw_max: u16,
    pub calibration: Calibration,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            samples: 20,
            sample_delay_ms: 10,
            valid_raw_min: 50,
            valid_raw_max: 4000,
            // Fitted from bench measurements: 3.0V→3168, 3.2V→3182, 3.8V→3374, 4.2V→3444
            calibration: Calibration::Linear {
                slope: 0.003944,
                intercept: -9.436,
            },
        }
    }
}

/// Battery voltage thresholds in volts
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PowerThresholds {
    /// Under-voltage lockout; the radio must stay off at or below this
    pub uvlo_v: f32,
    /// Critical level; long sleep and no radio at or below this
    pub critical_v: f32,
    /// Start of the sleep scaling band (maximum scaled sleep here)
    pub low_v: f32,
    /// Nominal full charge (minimum scaled sleep here)
    pub full_v: f32,
    /// Depleted cell, 0% for the percentage estimate
    pub empty_v: f32,
    /// Above this the node is assumed to be on USB power
    pub usb_v: f32,
    /// Above this (and below `usb_v`) the cell is being charged from USB
    pub usb_charging_v: f32,
    /// Raw light level above which the panel is assumed to be charging
    pub charging_light_level: u16,
    /// Minimum voltage for the light-level charging indicator
    pub light_charging_min_v: f32,
    /// Above this the cell is treated as topped off / on charge
    pub high_v: f32,
}

impl Default for PowerThresholds {
    fn default() -> Self {
        Self {
            uvlo_v: 3.6,
            critical_v: 3.7,
            low_v: 3.7,
            full_v: 4.2,
            empty_v: 3.0,
            usb_v: 4.5,
            usb_charging_v: 4.0,
            charging_light_level: 2000,
            light_charging_min_v: 3.9,
            high_v: 4.1,
        }
    }
}

/// Charge-trend classification thresholds
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrendConfig {
    /// Samples required before any trend is reported
    pub min_samples: usize,
    /// Differences averaged for the recent trend
    pub recent_window: usize,
    /// Recent trend (V per sample) that counts as a rise
    pub rising_v: f32,
    /// Overall trend (V per sample) that confirms a stable rise
    pub stable_rise_v: f32,
    /// Current voltage must be at least this for a trend-based charge
    pub charging_floor_v: f32,
    /// Current voltage above this counts as charging on a plateau
    pub high_v: f32,
    /// Overall trend must stay above this for the plateau rule
    pub max_decline_v: f32,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_samples: 3,
            recent_window: 3,
            rising_v: 0.015,
            stable_rise_v: 0.005,
            charging_floor_v: 3.8,
            high_v: 4.1,
            max_decline_v: -0.01,
        }
    }
}

/// Sleep durations in minutes
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SleepConfig {
    pub min_minutes: u32,
    /// Longest sleep produced by voltage scaling
    pub max_scaled_minutes: u32,
    pub critical_minutes: u32,
    pub uvlo_minutes: u32,
    /// Used when the cycle could not gather trustworthy readings
    pub fault_minutes: u32,
}

impl SleepConfig {
    /// Longest duration any rule can produce
    pub fn longest_minutes(&self) -> u32 {
        self.uvlo_minutes
            .max(self.critical_minutes)
            .max(self.max_scaled_minutes)
            .max(self.fault_minutes)
    }
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            min_minutes: 120,
            max_scaled_minutes: 360,
            critical_minutes: 24 * 60,
            uvlo_minutes: 48 * 60,
            fault_minutes: 120,
        }
    }
}

/// Sensor power, warm-up and retry settings
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SensorConfig {
    /// Wait after switching the sensor rail on
    pub warmup_ms: u32,
    /// Climate sensor read attempts, including the first one
    pub climate_attempts: u8,
    /// Rail off time during a power cycle
    pub rail_off_ms: u32,
    /// Rail on time before retrying after a power cycle
    pub rail_settle_ms: u32,
    /// Raw readings averaged for light and moisture
    pub analog_samples: u8,
    pub analog_delay_ms: u32,
    pub temperature_range_c: (f32, f32),
    pub humidity_range_pct: (f32, f32),
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 2000,
            climate_attempts: 3,
            rail_off_ms: 100,
            rail_settle_ms: 500,
            analog_samples: 5,
            analog_delay_ms: 10,
            temperature_range_c: (-20.0, 60.0),
            humidity_range_pct: (0.0, 100.0),
        }
    }
}

/// Soil moisture probe calibration (lower raw = wetter)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MoistureCalibration {
    /// Raw count for a saturated probe (100%)
    pub wet_raw: u16,
    /// Raw count for a dry probe (0%)
    pub dry_raw: u16,
}

impl Default for MoistureCalibration {
    fn default() -> Self {
        Self {
            wet_raw: 1300,
            dry_raw: 1850,
        }
    }
}

/// Upload timing and retry bounds
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct UploadConfig {
    pub max_attempts: u8,
    /// Fixed wait between attempts; raise it for cloud hosts with cold starts
    pub retry_delay_ms: u32,
    pub wifi_timeout_ms: u32,
    pub http_timeout_ms: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay_ms: 2000,
            wifi_timeout_ms: 30_000,
            http_timeout_ms: 30_000,
        }
    }
}

/// WiFi credentials and dashboard endpoint
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

impl Default for NetworkConfig<'_> {
    fn default() -> Self {
        Self {
            ssid: "",
            password: "",
            host: "",
            port: 3000,
            path: "/api/data",
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("voltage thresholds out of order: {0}")]
    ThresholdOrder(&'static str),
    #[error("sleep durations out of order: {0}")]
    SleepOrder(&'static str),
    #[error("moisture calibration wet count must be below dry count")]
    MoistureCalibration,
    #[error("{0} must be non-zero")]
    Zero(&'static str),
}

impl NodeConfig<'_> {
    /// Check that thresholds and durations are mutually consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if t.uvlo_v > t.critical_v {
            return Err(ConfigError::ThresholdOrder("uvlo above critical"));
        }
        if t.low_v >= t.full_v {
            return Err(ConfigError::ThresholdOrder("low not below full"));
        }
        if t.empty_v >= t.full_v {
            return Err(ConfigError::ThresholdOrder("empty not below full"));
        }

        let s = &self.sleep;
        if s.min_minutes == 0 {
            return Err(ConfigError::Zero("minimum sleep"));
        }
        if s.min_minutes > s.max_scaled_minutes {
            return Err(ConfigError::SleepOrder("minimum above scaled maximum"));
        }
        if s.critical_minutes > s.uvlo_minutes {
            return Err(ConfigError::SleepOrder("critical longer than uvlo"));
        }

        if self.moisture.wet_raw >= self.moisture.dry_raw {
            return Err(ConfigError::MoistureCalibration);
        }
        if self.battery.samples == 0 {
            return Err(ConfigError::Zero("battery samples"));
        }
        if self.sensors.analog_samples == 0 {
            return Err(ConfigError::Zero("analog samples"));
        }
        if self.upload.max_attempts == 0 {
            return Err(ConfigError::Zero("upload attempts"));
        }
        if self.trend.recent_window == 0 || self.trend.min_samples < 2 {
            return Err(ConfigError::Zero("trend window"));
        }

        Ok(())
    }
}
