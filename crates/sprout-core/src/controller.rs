//! Async wake-cycle controller
//!
//! Runs one complete wake: power the sensors, gather readings, plan the cycle
//! with [`plan_cycle`], optionally upload, and power everything back down.
//! The caller persists the returned state and enters deep sleep for the
//! decided duration.

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::battery::BatterySampler;
use crate::config::NodeConfig;
use crate::cycle::{CycleInputs, NetworkAction, SuppressReason, plan_cycle};
use crate::indicator::{self, BlinkPattern};
use crate::policy::SleepDecision;
use crate::reading::{DeviceId, SensorReading, UploadPayload};
use crate::sensors::{AnalogFrontEnd, AnalogSource, ClimateSensor, average_analog, read_climate};
use crate::state::{CycleState, WakeCause};
use crate::upload::{Network, UploadError, UploadReceipt, Uploader};

/// Upload body buffer; the payload is well under half of this
const PAYLOAD_CAPACITY: usize = 512;

/// Hardware the controller drives during a wake
pub struct NodePeripherals<A, C, R, N, L, P, D> {
    pub analog: A,
    pub climate: C,
    /// Switched supply for the climate, light and moisture sensors
    pub rail: R,
    pub network: N,
    pub led: L,
    /// Pump driver, only ever held off
    pub pump: P,
    pub delay: D,
}

/// What happened to this cycle's reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Skipped(SuppressReason),
    Delivered(UploadReceipt),
    Failed(UploadError),
}

/// Result of one wake cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// State to persist before sleeping
    pub state: CycleState,
    pub decision: SleepDecision,
    pub upload: UploadOutcome,
    pub reading: Option<SensorReading>,
    pub charging: bool,
}

pub struct CycleController<'a, A, C, R, N, L, P, D> {
    config: &'a NodeConfig<'a>,
    hw: NodePeripherals<A, C, R, N, L, P, D>,
}

impl<'a, A, C, R, N, L, P, D> CycleController<'a, A, C, R, N, L, P, D>
where
    A: AnalogFrontEnd,
    C: ClimateSensor,
    R: OutputPin,
    N: Network,
    L: OutputPin,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(config: &'a NodeConfig<'a>, hw: NodePeripherals<A, C, R, N, L, P, D>) -> Self {
        Self { config, hw }
    }

    pub fn peripherals(&self) -> &NodePeripherals<A, C, R, N, L, P, D> {
        &self.hw
    }

    /// Run one wake cycle starting from `state`.
    pub async fn run(
        &mut self,
        state: CycleState,
        wake: WakeCause,
        timestamp_ms: u64,
        device_id: &DeviceId,
    ) -> CycleReport {
        info!("=== Wake #{} ({}) ===", state.boot_count.wrapping_add(1), wake.label());
        if wake == WakeCause::Timer {
            info!(
                "Slept {} min, {} consecutive failed uploads",
                state.last_sleep_minutes, state.failed_uploads
            );
        }

        let inputs = self.gather(timestamp_ms).await;
        let plan = plan_cycle(&state, &inputs, self.config);
        let mut next_state = plan.next_state;

        let upload = match (plan.network, plan.reading) {
            (NetworkAction::Upload, Some(reading)) => {
                let result = self
                    .upload(
                        &reading,
                        device_id,
                        next_state.boot_count,
                        plan.decision.minutes,
                        plan.charging,
                    )
                    .await;
                next_state.apply_upload_result(result.is_ok());
                info!("Failed uploads: {}", next_state.failed_uploads);

                match result {
                    Ok(receipt) => UploadOutcome::Delivered(receipt),
                    Err(e) => UploadOutcome::Failed(e),
                }
            }
            (NetworkAction::Suppress(reason), _) => {
                warn!("Skipping upload: {:?}", reason);
                let pattern = BlinkPattern::for_suppressed(reason, plan.decision.state);
                indicator::show(&mut self.hw.led, &mut self.hw.delay, pattern).await;
                UploadOutcome::Skipped(reason)
            }
            (NetworkAction::Upload, None) => {
                // plan_cycle only requests an upload with a complete reading
                UploadOutcome::Skipped(SuppressReason::SensorFault)
            }
        };

        self.power_down();
        info!(
            "Sleeping {} min ({}), trend: {}",
            plan.decision.minutes,
            plan.decision.state.label(),
            if plan.charging { "charging" } else { "discharging" }
        );

        CycleReport {
            state: next_state,
            decision: plan.decision,
            upload,
            reading: plan.reading,
            charging: plan.charging,
        }
    }

    async fn gather(&mut self, timestamp_ms: u64) -> CycleInputs {
        let config = self.config;
        let hw = &mut self.hw;

        if hw.rail.set_high().is_err() {
            warn!("Sensor rail did not switch on");
        }
        hw.delay.delay_ms(config.sensors.warmup_ms).await;

        let climate =
            read_climate(&mut hw.climate, &mut hw.rail, &mut hw.delay, &config.sensors).await;

        let samples = config.sensors.analog_samples;
        let spacing = config.sensors.analog_delay_ms;
        let light = average_analog(
            &mut hw.analog,
            &mut hw.delay,
            AnalogSource::Light,
            samples,
            spacing,
        )
        .await;
        let moisture = average_analog(
            &mut hw.analog,
            &mut hw.delay,
            AnalogSource::Moisture,
            samples,
            spacing,
        )
        .await;

        let battery = BatterySampler::new(&config.battery)
            .sample(&mut hw.analog, &mut hw.delay)
            .await;

        // An analog failure degrades the cycle the same way a climate failure does
        let (light_level, moisture_level, climate) = match (light, moisture) {
            (Ok(light), Ok(moisture)) => (light, moisture, climate),
            (Err(e), _) | (_, Err(e)) => {
                error!("Analog sensor read failed: {}", e);
                (0, 0, Err(e))
            }
        };

        CycleInputs {
            battery,
            climate,
            light_level,
            moisture_level,
            timestamp_ms,
        }
    }

    async fn upload(
        &mut self,
        reading: &SensorReading,
        device_id: &DeviceId,
        boot_count: u32,
        sleep_minutes: u32,
        charging: bool,
    ) -> Result<UploadReceipt, UploadError> {
        let config = self.config;
        let hw = &mut self.hw;

        let rssi = match hw.network.connect(config.upload.wifi_timeout_ms).await {
            Ok(rssi) => rssi,
            Err(e) => {
                error!("WiFi connection failed: {:?}", e);
                hw.network.disconnect().await;
                indicator::show(&mut hw.led, &mut hw.delay, BlinkPattern::WifiFailed).await;
                return Err(UploadError::Connect);
            }
        };
        info!("WiFi connected, RSSI {} dBm", rssi);

        let payload =
            UploadPayload::new(device_id, reading, boot_count, rssi, sleep_minutes, charging);
        let mut body = [0u8; PAYLOAD_CAPACITY];
        let result = match payload.to_json(&mut body) {
            Ok(len) => {
                Uploader::new(&config.upload)
                    .upload(&mut hw.network, &mut hw.delay, &body[..len])
                    .await
            }
            Err(_) => Err(UploadError::Serialize),
        };

        hw.network.disconnect().await;

        let pattern = match result {
            Ok(_) => BlinkPattern::UploadSucceeded,
            Err(_) => BlinkPattern::UploadFailed,
        };
        indicator::show(&mut hw.led, &mut hw.delay, pattern).await;

        result
    }

    fn power_down(&mut self) {
        if self.hw.rail.set_low().is_err() {
            warn!("Sensor rail did not switch off");
        }
        if self.hw.pump.set_low().is_err() {
            warn!("Pump output did not switch off");
        }
    }
}
