//! Host-side stand-ins for the node hardware

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_async::delay::DelayNs;

use crate::sensors::{AnalogFrontEnd, AnalogSource, ClimateReading, ClimateSensor, SensorError};
use crate::upload::{HttpTransport, Network};

/// Replays fixed raw counts per input, cycling when exhausted.
pub struct MockAnalog {
    pub battery: &'static [u16],
    pub light: &'static [u16],
    pub moisture: &'static [u16],
    pub fail: bool,
    reads: [usize; 3],
}

impl MockAnalog {
    pub fn new() -> Self {
        Self {
            battery: &[3374],
            light: &[100],
            moisture: &[1500],
            fail: false,
            reads: [0; 3],
        }
    }
}

impl AnalogFrontEnd for MockAnalog {
    async fn read_raw(&mut self, source: AnalogSource) -> Result<u16, SensorError> {
        if self.fail {
            return Err(SensorError::ReadFailed {
                sensor: source.label(),
                operation: "oneshot conversion",
            });
        }

        let (values, slot) = match source {
            AnalogSource::Battery => (self.battery, 0),
            AnalogSource::Light => (self.light, 1),
            AnalogSource::Moisture => (self.moisture, 2),
        };
        let value = values[self.reads[slot] % values.len()];
        self.reads[slot] += 1;
        Ok(value)
    }
}

pub struct MockClimate {
    pub reading: ClimateReading,
    /// Measurements that fail before the sensor starts answering
    pub failures_before_success: u32,
    pub measurements: u32,
    pub inits: u32,
}

impl MockClimate {
    pub fn ok(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            reading: ClimateReading {
                temperature_c,
                humidity_pct,
            },
            failures_before_success: 0,
            measurements: 0,
            inits: 0,
        }
    }

    pub fn dead() -> Self {
        let mut sensor = Self::ok(0.0, 0.0);
        sensor.failures_before_success = u32::MAX;
        sensor
    }
}

impl ClimateSensor for MockClimate {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.inits += 1;
        Ok(())
    }

    async fn measure(&mut self) -> Result<ClimateReading, SensorError> {
        self.measurements += 1;
        if self.measurements <= self.failures_before_success {
            return Err(SensorError::ReadFailed {
                sensor: "SHT40",
                operation: "measure",
            });
        }
        Ok(self.reading)
    }
}

/// Counts level changes
#[derive(Default)]
pub struct MockPin {
    pub highs: u32,
    pub lows: u32,
    pub is_high: bool,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.lows += 1;
        self.is_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.highs += 1;
        self.is_high = true;
        Ok(())
    }
}

/// Returns immediately, accumulating the requested time
#[derive(Default)]
pub struct NoopDelay {
    pub total_ms: u32,
}

impl DelayNs for NoopDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ms += ns / 1_000_000;
    }

    async fn delay_us(&mut self, us: u32) {
        self.total_ms += us / 1_000;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

/// Scripted network link and HTTP server
pub struct MockNetwork {
    /// One entry per post; the last entry repeats
    pub statuses: &'static [Result<u16, ()>],
    pub connect_result: Result<i8, ()>,
    pub posts: usize,
    pub connects: u32,
    pub disconnects: u32,
    pub bodies: Vec<Vec<u8>>,
}

impl MockNetwork {
    pub fn with_statuses(statuses: &'static [Result<u16, ()>]) -> Self {
        Self {
            statuses,
            connect_result: Ok(-58),
            posts: 0,
            connects: 0,
            disconnects: 0,
            bodies: Vec::new(),
        }
    }

    pub fn unreachable() -> Self {
        let mut network = Self::with_statuses(&[Err(())]);
        network.connect_result = Err(());
        network
    }
}

impl HttpTransport for MockNetwork {
    type Error = ();

    async fn post_json(&mut self, body: &[u8]) -> Result<u16, ()> {
        let index = self.posts.min(self.statuses.len() - 1);
        self.posts += 1;
        self.bodies.push(body.to_vec());
        self.statuses[index]
    }
}

impl Network for MockNetwork {
    async fn connect(&mut self, _timeout_ms: u32) -> Result<i8, ()> {
        self.connects += 1;
        self.connect_result
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}
