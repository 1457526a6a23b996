//! Charging-trend detection from the battery voltage history
//!
//! Two figures are derived from the history, newest first:
//! - the recent trend, the mean of the last few first differences, reacts
//!   quickly when external power is connected
//! - the overall trend, the mean over the whole window, confirms the rise is
//!   not noise
//!
//! A trend-only rule misses a topped-off cell sitting on a flat plateau, and
//! a voltage-only rule misfires on a freshly charged cell that is already
//! discharging, so charging is declared on either of two paths (see
//! [`TrendAnalysis::indicates_charging`]).

use log::debug;

use crate::config::TrendConfig;
use crate::history::RingBuffer;

/// Trend figures computed from the history, in volts per sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendAnalysis {
    pub recent: f32,
    pub overall: f32,
    /// Most recent voltage
    pub current: f32,
    /// Samples the figures were computed from
    pub samples: usize,
}

impl TrendAnalysis {
    pub fn indicates_charging(&self, config: &TrendConfig) -> bool {
        let rising = self.recent > config.rising_v
            && self.overall > config.stable_rise_v
            && self.current >= config.charging_floor_v;
        let plateau = self.current > config.high_v && self.overall > config.max_decline_v;

        rising || plateau
    }
}

/// Recent calibrated battery voltages
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryHistory<const N: usize> {
    ring: RingBuffer<f32, N>,
}

impl<const N: usize> BatteryHistory<N> {
    pub fn new() -> Self {
        Self {
            ring: RingBuffer::new(),
        }
    }

    pub fn from_ring(ring: RingBuffer<f32, N>) -> Self {
        Self { ring }
    }

    pub fn ring(&self) -> &RingBuffer<f32, N> {
        &self.ring
    }

    /// Append a calibrated voltage, overwriting the oldest once full.
    pub fn record_sample(&mut self, voltage: f32) {
        self.ring.push(voltage);
        debug!(
            "Battery history updated: {:.2}V (next index {})",
            voltage,
            self.ring.write_index()
        );
    }

    /// Most recent voltage
    pub fn current(&self) -> Option<f32> {
        self.ring.latest()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Trend figures, or `None` with fewer than `config.min_samples` samples.
    pub fn trend(&self, config: &TrendConfig) -> Option<TrendAnalysis> {
        let samples = self.ring.len();
        if samples < config.min_samples.max(2) {
            return None;
        }

        let current = self.ring.latest()?;
        let differences = samples - 1;
        let recent_count = config.recent_window.min(differences).max(1);

        let mut recent_sum = 0.0_f32;
        let mut overall_sum = 0.0_f32;
        for age in 0..differences {
            let newer = self.ring.newest(age)?;
            let older = self.ring.newest(age + 1)?;
            let delta = newer - older;

            overall_sum += delta;
            if age < recent_count {
                recent_sum += delta;
            }
        }

        Some(TrendAnalysis {
            recent: recent_sum / recent_count as f32,
            overall: overall_sum / differences as f32,
            current,
            samples,
        })
    }

    /// Whether the history shows the cell charging. Conservatively `false`
    /// until enough samples exist.
    pub fn is_charging(&self, config: &TrendConfig) -> bool {
        match self.trend(config) {
            Some(trend) => {
                let charging = trend.indicates_charging(config);
                debug!(
                    "Battery trends - recent: {:.3}V, overall: {:.3}V, current: {:.2}V, charging: {}",
                    trend.recent, trend.overall, trend.current, charging
                );
                charging
            }
            None => false,
        }
    }
}
