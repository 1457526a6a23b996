//! Battery sampling and voltage calibration
//!
//! The battery is read through a resistor divider on an ADC input. A single
//! conversion is noisy and occasionally glitches to near zero or near full
//! scale, so a sample averages many conversions after discarding readings
//! outside a plausible band, then converts the mean with a calibration.
//!
//! Two calibration strategies exist because the boards differ: the
//! production board uses an empirically fitted line, the bring-up board the
//! theoretical divider ratio against the ADC reference.

use embedded_hal_async::delay::DelayNs;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::config::{BatteryConfig, PowerThresholds};
use crate::sensors::{AnalogFrontEnd, AnalogSource, SensorError};

/// Voltage reported when no valid battery reading could be taken.
///
/// This is a reporting value only and must never be fed to the sleep policy.
pub const FAILURE_VOLTAGE: f32 = 0.0;

/// Conversion from mean raw ADC count to volts
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Calibration {
    /// `voltage = slope * raw + intercept`
    Linear { slope: f32, intercept: f32 },
    /// `voltage = raw / full_scale * reference_v * ratio`
    Divider {
        ratio: f32,
        reference_v: f32,
        full_scale: u16,
    },
}

impl Calibration {
    pub fn to_volts(&self, mean_raw: f32) -> f32 {
        match *self {
            Self::Linear { slope, intercept } => slope * mean_raw + intercept,
            Self::Divider {
                ratio,
                reference_v,
                full_scale,
            } => mean_raw / f32::from(full_scale) * reference_v * ratio,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BatteryError {
    #[error("no valid battery readings out of {taken}")]
    NoValidReadings { taken: u8 },
    #[error("battery ADC read failed: {0}")]
    Adc(SensorError),
}

impl BatteryError {
    /// Voltage to report in place of a real measurement
    pub const fn sentinel_voltage(&self) -> f32 {
        FAILURE_VOLTAGE
    }
}

/// A calibrated battery measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterySample {
    pub voltage: f32,
    /// Mean of the readings that passed the glitch filter
    pub mean_raw: f32,
    pub valid_readings: u8,
}

/// The calibrated voltage, or [`FAILURE_VOLTAGE`] for a failed sample
pub fn voltage_or_sentinel(sample: &Result<BatterySample, BatteryError>) -> f32 {
    match sample {
        Ok(sample) => sample.voltage,
        Err(e) => e.sentinel_voltage(),
    }
}

/// Averages filtered ADC readings into a calibrated battery voltage
pub struct BatterySampler<'a> {
    config: &'a BatteryConfig,
}

impl<'a> BatterySampler<'a> {
    pub const fn new(config: &'a BatteryConfig) -> Self {
        Self { config }
    }

    /// Take `config.samples` readings and convert their filtered mean.
    pub async fn sample<A, D>(
        &self,
        analog: &mut A,
        delay: &mut D,
    ) -> Result<BatterySample, BatteryError>
    where
        A: AnalogFrontEnd,
        D: DelayNs,
    {
        let mut sum: u32 = 0;
        let mut valid: u8 = 0;

        for _ in 0..self.config.samples {
            let raw = analog
                .read_raw(AnalogSource::Battery)
                .await
                .map_err(BatteryError::Adc)?;

            if self.is_plausible(raw) {
                sum += u32::from(raw);
                valid += 1;
            }

            delay.delay_ms(self.config.sample_delay_ms).await;
        }

        self.convert(sum, valid)
    }

    /// Whether a raw count lies strictly inside the plausible band
    pub fn is_plausible(&self, raw: u16) -> bool {
        raw > self.config.valid_raw_min && raw < self.config.valid_raw_max
    }

    fn convert(&self, sum: u32, valid: u8) -> Result<BatterySample, BatteryError> {
        if valid == 0 {
            error!("No valid battery readings out of {}", self.config.samples);
            return Err(BatteryError::NoValidReadings {
                taken: self.config.samples,
            });
        }

        let mean_raw = sum as f32 / f32::from(valid);
        let voltage = self.config.calibration.to_volts(mean_raw);

        debug!(
            "Battery ADC: {:.1} (from {} samples), voltage: {:.2}V",
            mean_raw, valid, voltage
        );

        Ok(BatterySample {
            voltage,
            mean_raw,
            valid_readings: valid,
        })
    }
}

/// Where the node is drawing power from, judged by terminal voltage alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    Usb,
    UsbCharging,
    Battery,
    Depleted,
}

impl PowerSource {
    pub fn classify(voltage: f32, thresholds: &PowerThresholds) -> Self {
        if voltage > thresholds.usb_v {
            Self::Usb
        } else if voltage > thresholds.usb_charging_v {
            Self::UsbCharging
        } else if voltage > thresholds.empty_v {
            Self::Battery
        } else {
            Self::Depleted
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Usb => "USB",
            Self::UsbCharging => "USB + charging",
            Self::Battery => "battery",
            Self::Depleted => "depleted",
        }
    }
}

/// Rough state of charge, linear between the empty and full voltages
pub fn battery_percent(voltage: f32, thresholds: &PowerThresholds) -> u8 {
    let span = thresholds.full_v - thresholds.empty_v;
    let ratio = ((voltage - thresholds.empty_v) / span).clamp(0.0, 1.0);
    (ratio * 100.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAnalog, NoopDelay};
    use embassy_futures::block_on;

    fn sample_with(battery: &'static [u16]) -> Result<BatterySample, BatteryError> {
        let config = BatteryConfig::default();
        let sampler = BatterySampler::new(&config);
        let mut analog = MockAnalog::new();
        analog.battery = battery;
        block_on(sampler.sample(&mut analog, &mut NoopDelay::default()))
    }

    #[test]
    fn test_linear_calibration() {
        let sample = sample_with(&[3374]).unwrap();
        assert_eq!(sample.valid_readings, 20);
        assert_eq!(sample.mean_raw, 3374.0);
        assert!((sample.voltage - 3.871).abs() < 0.01, "got {}", sample.voltage);
    }

    #[test]
    fn test_glitches_are_filtered() {
        // Alternating glitch readings should not move the mean
        let sample = sample_with(&[3374, 0, 3374, 4095]).unwrap();
        assert_eq!(sample.valid_readings, 10);
        assert_eq!(sample.mean_raw, 3374.0);
    }

    #[test]
    fn test_band_edges_are_rejected() {
        let config = BatteryConfig::default();
        let sampler = BatterySampler::new(&config);
        assert!(!sampler.is_plausible(50));
        assert!(sampler.is_plausible(51));
        assert!(sampler.is_plausible(3999));
        assert!(!sampler.is_plausible(4000));
    }

    #[test]
    fn test_all_readings_invalid_returns_sentinel() {
        let result = sample_with(&[0, 4095, 12, 4050]);
        assert_eq!(result, Err(BatteryError::NoValidReadings { taken: 20 }));

        let voltage = voltage_or_sentinel(&result);
        assert_eq!(voltage, FAILURE_VOLTAGE);
        assert!(!voltage.is_nan());
    }

    #[test]
    fn test_adc_error_propagates() {
        let config = BatteryConfig::default();
        let sampler = BatterySampler::new(&config);
        let mut analog = MockAnalog::new();
        analog.fail = true;

        let result = block_on(sampler.sample(&mut analog, &mut NoopDelay::default()));
        assert!(matches!(result, Err(BatteryError::Adc(_))));
    }

    #[test]
    fn test_divider_calibration() {
        let calibration = Calibration::Divider {
            ratio: 1.51,
            reference_v: 3.3,
            full_scale: 4095,
        };
        let volts = calibration.to_volts(3300.0);
        assert!((volts - 4.0156).abs() < 0.001, "got {}", volts);
    }

    #[test]
    fn test_power_source_classification() {
        let t = PowerThresholds::default();
        assert_eq!(PowerSource::classify(4.8, &t), PowerSource::Usb);
        assert_eq!(PowerSource::classify(4.1, &t), PowerSource::UsbCharging);
        assert_eq!(PowerSource::classify(3.7, &t), PowerSource::Battery);
        assert_eq!(PowerSource::classify(2.9, &t), PowerSource::Depleted);
    }

    #[test]
    fn test_battery_percent() {
        let t = PowerThresholds::default();
        assert_eq!(battery_percent(3.0, &t), 0);
        assert_eq!(battery_percent(3.6, &t), 50);
        assert_eq!(battery_percent(4.2, &t), 100);
        assert_eq!(battery_percent(5.0, &t), 100);
        assert_eq!(battery_percent(-1.0, &t), 0);
    }
}
