//! Per-cycle sensor reading and its JSON upload body

use core::fmt::Write;

use heapless::String;
use serde::Serialize;

use crate::config::{MoistureCalibration, PowerThresholds};
use crate::sensors::ClimateReading;

/// Everything measured during one wake cycle. Discarded after upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub battery_voltage: f32,
    /// Raw light level (0..=4095)
    pub light_level: u16,
    /// Raw moisture level (0..=4095, lower is wetter)
    pub moisture_level: u16,
    /// 0.0..=100.0
    pub moisture_percent: f32,
    pub low_battery: bool,
    /// Milliseconds since boot when the cycle started
    pub timestamp_ms: u64,
}

impl SensorReading {
    pub fn new(
        climate: ClimateReading,
        battery_voltage: f32,
        light_level: u16,
        moisture_level: u16,
        timestamp_ms: u64,
        moisture: &MoistureCalibration,
        thresholds: &PowerThresholds,
    ) -> Self {
        Self {
            temperature_c: climate.temperature_c,
            humidity_pct: climate.humidity_pct,
            battery_voltage,
            light_level,
            moisture_level,
            moisture_percent: moisture_percent(moisture_level, moisture),
            low_battery: is_low_battery(battery_voltage, thresholds),
            timestamp_ms,
        }
    }
}

/// Soil moisture as a percentage; the probe reads lower when wetter.
pub fn moisture_percent(raw: u16, calibration: &MoistureCalibration) -> f32 {
    let wet = f32::from(calibration.wet_raw);
    let dry = f32::from(calibration.dry_raw);
    let raw = f32::from(raw);

    if raw <= wet {
        return 100.0;
    }
    if raw >= dry {
        return 0.0;
    }

    (100.0 * (dry - raw) / (dry - wet)).clamp(0.0, 100.0)
}

/// Low but still above lockout
pub fn is_low_battery(voltage: f32, thresholds: &PowerThresholds) -> bool {
    voltage < thresholds.low_v && voltage > thresholds.uvlo_v
}

/// Node identifier derived from the station MAC address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(String<17>);

impl DeviceId {
    pub fn from_mac(mac: [u8; 6]) -> Self {
        let mut id = String::new();
        for (i, byte) in mac.iter().enumerate() {
            if i > 0 {
                // Capacity is exactly 6 * 2 + 5 separators
                let _ = id.push(':');
            }
            let _ = write!(id, "{:02X}", byte);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// JSON body posted to the dashboard; field names are the wire format.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct UploadPayload<'a> {
    pub device_id: &'a str,
    pub timestamp: u64,
    pub temperature: f32,
    pub humidity: f32,
    pub battery_voltage: f32,
    pub light_level: u16,
    pub moisture_level: u16,
    pub moisture_percent: f32,
    pub boot_count: u32,
    pub rssi: i8,
    pub low_battery: bool,
    pub sleep_minutes: u32,
    pub charging: bool,
}

impl<'a> UploadPayload<'a> {
    pub fn new(
        device_id: &'a DeviceId,
        reading: &SensorReading,
        boot_count: u32,
        rssi: i8,
        sleep_minutes: u32,
        charging: bool,
    ) -> Self {
        Self {
            device_id: device_id.as_str(),
            timestamp: reading.timestamp_ms,
            temperature: reading.temperature_c,
            humidity: reading.humidity_pct,
            battery_voltage: reading.battery_voltage,
            light_level: reading.light_level,
            moisture_level: reading.moisture_level,
            moisture_percent: reading.moisture_percent,
            boot_count,
            rssi,
            low_battery: reading.low_battery,
            sleep_minutes,
            charging,
        }
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, serde_json_core::ser::Error> {
        serde_json_core::to_slice(self, buf)
    }
}
