use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{debug, error, warn};

use super::{AnalogFrontEnd, AnalogSource, ClimateReading, ClimateSensor, SensorError};
use crate::config::SensorConfig;

/// Average `samples` raw conversions of one analog input.
///
/// A single failed conversion fails the whole read; light and moisture have
/// no plausible band to filter against.
pub async fn average_analog<A, D>(
    analog: &mut A,
    delay: &mut D,
    source: AnalogSource,
    samples: u8,
    delay_ms: u32,
) -> Result<u16, SensorError>
where
    A: AnalogFrontEnd,
    D: DelayNs,
{
    let samples = samples.max(1);
    let mut sum: u32 = 0;

    for _ in 0..samples {
        sum += u32::from(analog.read_raw(source).await?);
        delay.delay_ms(delay_ms).await;
    }

    let average = (sum / u32::from(samples)) as u16;
    debug!("{}: {} (from {} samples)", source.label(), average, samples);
    Ok(average)
}

/// Read the climate sensor, power-cycling its rail between failed attempts.
///
/// The rail is expected to be on and warmed up when this is called. Readings
/// outside the configured plausible ranges count as failed attempts.
pub async fn read_climate<C, R, D>(
    sensor: &mut C,
    rail: &mut R,
    delay: &mut D,
    config: &SensorConfig,
) -> Result<ClimateReading, SensorError>
where
    C: ClimateSensor,
    R: OutputPin,
    D: DelayNs,
{
    let attempts = config.climate_attempts.max(1);

    for attempt in 1..=attempts {
        if attempt > 1 {
            warn!("Climate sensor retry {}/{}", attempt, attempts);
            power_cycle(rail, delay, config).await;
        }

        if let Err(e) = sensor.init().await {
            error!("Climate sensor init failed: {}", e);
            continue;
        }

        match sensor.measure().await.and_then(|r| check_range(r, config)) {
            Ok(reading) => return Ok(reading),
            Err(e) => error!("Climate sensor read failed: {}", e),
        }
    }

    Err(SensorError::Exhausted {
        sensor: "climate",
        attempts,
    })
}

fn check_range(
    reading: ClimateReading,
    config: &SensorConfig,
) -> Result<ClimateReading, SensorError> {
    let (t_min, t_max) = config.temperature_range_c;
    if !(t_min..=t_max).contains(&reading.temperature_c) {
        return Err(SensorError::OutOfRange {
            sensor: "temperature",
            value: reading.temperature_c,
        });
    }

    let (h_min, h_max) = config.humidity_range_pct;
    if !(h_min..=h_max).contains(&reading.humidity_pct) {
        return Err(SensorError::OutOfRange {
            sensor: "humidity",
            value: reading.humidity_pct,
        });
    }

    Ok(reading)
}

/// Switch the sensor rail off and back on, waiting for it to settle.
pub async fn power_cycle<R, D>(rail: &mut R, delay: &mut D, config: &SensorConfig)
where
    R: OutputPin,
    D: DelayNs,
{
    if rail.set_low().is_err() {
        warn!("Sensor rail did not switch off");
    }
    delay.delay_ms(config.rail_off_ms).await;
    if rail.set_high().is_err() {
        warn!("Sensor rail did not switch on");
    }
    delay.delay_ms(config.rail_settle_ms).await;
}
