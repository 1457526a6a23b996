//! Pure per-wake planning
//!
//! [`plan_cycle`] takes the retained state and everything measured this wake
//! and returns the next state plus what to do with the radio and how long to
//! sleep. It performs no I/O, so every branch of a wake cycle can be tested
//! on the host; [`crate::controller`] executes the plan.

use log::{info, warn};

use crate::battery::{BatteryError, BatterySample, PowerSource, battery_percent};
use crate::config::NodeConfig;
use crate::policy::{PolicyInputs, PowerState, SleepDecision, SleepPolicy};
use crate::reading::SensorReading;
use crate::sensors::{ClimateReading, SensorError};
use crate::state::CycleState;
use crate::trend::TrendAnalysis;

/// Everything gathered from the hardware during one wake
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInputs {
    pub battery: Result<BatterySample, BatteryError>,
    pub climate: Result<ClimateReading, SensorError>,
    pub light_level: u16,
    pub moisture_level: u16,
    pub timestamp_ms: u64,
}

/// Why the radio stays off this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Battery at or below the critical level
    PowerSafety,
    /// No valid battery reading
    BatteryFault,
    /// Climate sensor did not produce a plausible reading
    SensorFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkAction {
    Upload,
    Suppress(SuppressReason),
}

/// Outcome of planning one wake cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclePlan {
    /// State to persist if nothing else changes (upload result is applied later)
    pub next_state: CycleState,
    pub decision: SleepDecision,
    pub network: NetworkAction,
    /// Present only when every sensor produced a valid value
    pub reading: Option<SensorReading>,
    pub trend: Option<TrendAnalysis>,
    pub charging: bool,
}

pub fn plan_cycle(state: &CycleState, inputs: &CycleInputs, config: &NodeConfig<'_>) -> CyclePlan {
    let mut next_state = *state;
    next_state.boot_count = next_state.boot_count.wrapping_add(1);

    let battery = match inputs.battery {
        Ok(sample) => sample,
        Err(e) => {
            warn!("Battery fault: {}", e);
            return battery_fault_plan(next_state, config);
        }
    };
    let voltage = battery.voltage;
    next_state.battery_history.record_sample(voltage);

    let trend = next_state.battery_history.trend(&config.trend);
    let charging = trend.is_some_and(|t| t.indicates_charging(&config.trend));

    let mut decision = SleepPolicy::from_config(config).evaluate(&PolicyInputs {
        voltage,
        light_level: inputs.light_level,
        charging,
        overall_trend: trend.map(|t| t.overall),
    });

    info!(
        "Battery: {:.2}V ({}%, {}), trend: {}",
        voltage,
        battery_percent(voltage, &config.thresholds),
        PowerSource::classify(voltage, &config.thresholds).label(),
        if charging { "charging" } else { "discharging" }
    );

    let reading = match inputs.climate {
        Ok(climate) => Some(SensorReading::new(
            climate,
            voltage,
            inputs.light_level,
            inputs.moisture_level,
            inputs.timestamp_ms,
            &config.moisture,
            &config.thresholds,
        )),
        Err(e) => {
            warn!("Sensor fault: {}", e);
            // At least the fault interval, longer if the policy asks for it
            decision.minutes = decision.minutes.max(config.sleep.fault_minutes);
            None
        }
    };
    next_state.last_sleep_minutes = decision.minutes;

    let network = if decision.state.suppresses_radio() {
        warn!("Radio disabled at {:.2}V ({})", voltage, decision.state.label());
        NetworkAction::Suppress(SuppressReason::PowerSafety)
    } else if reading.is_none() {
        NetworkAction::Suppress(SuppressReason::SensorFault)
    } else {
        NetworkAction::Upload
    };

    CyclePlan {
        next_state,
        decision,
        network,
        reading,
        trend,
        charging,
    }
}

/// Without a trustworthy voltage the history is left untouched and the
/// node sleeps the fixed fault interval.
fn battery_fault_plan(mut next_state: CycleState, config: &NodeConfig<'_>) -> CyclePlan {
    let sleep = &config.sleep;
    let decision = SleepDecision {
        minutes: sleep.fault_minutes.clamp(sleep.min_minutes, sleep.longest_minutes()),
        state: PowerState::Unknown,
    };
    next_state.last_sleep_minutes = decision.minutes;

    CyclePlan {
        next_state,
        decision,
        network: NetworkAction::Suppress(SuppressReason::BatteryFault),
        reading: None,
        trend: None,
        charging: false,
    }
}
