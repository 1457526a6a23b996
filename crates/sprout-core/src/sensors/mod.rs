//! Sensor traits and acquisition helpers
//!
//! The firmware implements [`AnalogFrontEnd`] on top of the ESP32 ADC and
//! [`ClimateSensor`] on top of the SHT40 driver; tests and the simulator
//! provide their own implementations.

mod acquire;

pub use acquire::*;

use core::future::Future;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SensorError {
    #[error("{sensor}: read failed during {operation}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: initialization failed ({details})")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: value {value} outside plausible range")]
    OutOfRange { sensor: &'static str, value: f32 },
    #[error("{sensor}: no response after {attempts} attempts")]
    Exhausted { sensor: &'static str, attempts: u8 },
}

/// Analog inputs wired to the ADC, all reporting 12-bit counts (0..=4095)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogSource {
    Battery,
    Light,
    Moisture,
}

impl AnalogSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Light => "light",
            Self::Moisture => "moisture",
        }
    }
}

/// Largest value a 12-bit conversion can produce
pub const ADC_FULL_SCALE: u16 = 4095;

/// One-shot access to the node's analog inputs
pub trait AnalogFrontEnd {
    /// Take a single raw conversion from the given input.
    fn read_raw(&mut self, source: AnalogSource) -> impl Future<Output = Result<u16, SensorError>>;
}

/// Temperature and relative humidity from the I2C climate sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Driver-level contract for the climate sensor
pub trait ClimateSensor {
    /// (Re)initialize the sensor after its rail has been powered.
    fn init(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Trigger a measurement and return the result.
    fn measure(&mut self) -> impl Future<Output = Result<ClimateReading, SensorError>>;
}
