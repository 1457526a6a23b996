//! Sleep-duration policy
//!
//! The policy maps battery voltage, light level and charging evidence to the
//! next sleep duration. It is an ordered table of rules evaluated top to
//! bottom; the first rule whose predicate holds produces the outcome. The
//! order is the safety guarantee: a bright light reading can never override
//! a critical battery, because the critical rule is checked first.
//!
//! Inside the conserving band the duration is interpolated rather than
//! stepped, so a voltage hovering near a threshold does not flip between two
//! durations from one cycle to the next.

use core::time::Duration;

use log::{debug, info};

use crate::config::{NodeConfig, PowerThresholds, SleepConfig, TrendConfig};

/// Why the node believes it has surplus power
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeEvidence {
    VoltageTrend,
    LightAndVoltage,
    HighVoltage,
}

impl ChargeEvidence {
    pub const fn label(self) -> &'static str {
        match self {
            Self::VoltageTrend => "voltage trend",
            Self::LightAndVoltage => "light + voltage",
            Self::HighVoltage => "high voltage",
        }
    }
}

/// Battery severity behind a sleep decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerState {
    /// Under-voltage lockout
    Uvlo,
    Critical,
    Charging(ChargeEvidence),
    /// Inside the scaling band; `ratio` is 0 at the low threshold, 1 at full
    Conserving { ratio: f32 },
    Healthy,
    /// No trustworthy reading this cycle; the policy was not consulted
    Unknown,
}

impl PowerState {
    /// Whether any radio activity must be avoided this cycle
    pub const fn suppresses_radio(&self) -> bool {
        matches!(self, Self::Uvlo | Self::Critical)
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Uvlo => "UVLO",
            Self::Critical => "critical",
            Self::Charging(_) => "charging",
            Self::Conserving { .. } => "conserving",
            Self::Healthy => "healthy",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome of the policy for one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepDecision {
    pub minutes: u32,
    pub state: PowerState,
}

impl SleepDecision {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.minutes) * 60)
    }
}

/// Everything the policy looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyInputs {
    /// Calibrated battery voltage
    pub voltage: f32,
    /// Raw light sensor level (0..=4095)
    pub light_level: u16,
    /// Charging verdict from the trend detector
    pub charging: bool,
    /// Overall voltage trend, when the history is long enough
    pub overall_trend: Option<f32>,
}

/// One row of the rule table
pub struct Rule {
    pub name: &'static str,
    /// `Some` when the rule holds for the inputs
    check: fn(&SleepPolicy, &PolicyInputs) -> Option<SleepDecision>,
}

impl Rule {
    pub fn applies(&self, policy: &SleepPolicy, inputs: &PolicyInputs) -> bool {
        (self.check)(policy, inputs).is_some()
    }
}

/// Rules in priority order, most severe first
static RULES: [Rule; 5] = [
    Rule {
        name: "uvlo",
        // Negated so a NaN voltage lands here rather than in a later rule
        check: |p, i| {
            (!(i.voltage > p.thresholds.uvlo_v)).then_some(SleepDecision {
                minutes: p.sleep.uvlo_minutes,
                state: PowerState::Uvlo,
            })
        },
    },
    Rule {
        name: "critical",
        check: |p, i| {
            (i.voltage <= p.thresholds.critical_v).then_some(SleepDecision {
                minutes: p.sleep.critical_minutes,
                state: PowerState::Critical,
            })
        },
    },
    Rule {
        name: "charging",
        check: |p, i| {
            p.charge_evidence(i).map(|evidence| SleepDecision {
                minutes: p.sleep.min_minutes,
                state: PowerState::Charging(evidence),
            })
        },
    },
    Rule {
        name: "conserving",
        check: |p, i| (i.voltage < p.thresholds.full_v).then(|| p.scaled(i.voltage)),
    },
    Rule {
        name: "healthy",
        check: |p, _| Some(p.healthy()),
    },
];

/// Computes the next sleep duration from battery and light conditions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SleepPolicy {
    thresholds: PowerThresholds,
    sleep: SleepConfig,
    /// Overall trend must stay above this for the high-voltage indicator
    max_decline_v: f32,
}

impl SleepPolicy {
    pub fn new(thresholds: PowerThresholds, sleep: SleepConfig) -> Self {
        Self {
            thresholds,
            sleep,
            max_decline_v: TrendConfig::default().max_decline_v,
        }
    }

    pub fn from_config(config: &NodeConfig<'_>) -> Self {
        Self {
            thresholds: config.thresholds,
            sleep: config.sleep,
            max_decline_v: config.trend.max_decline_v,
        }
    }

    /// The rule table, in evaluation order
    pub fn rules() -> &'static [Rule] {
        &RULES
    }

    /// Decide without trend information beyond the charging verdict.
    pub fn decide(&self, voltage: f32, light_level: u16, charging: bool) -> SleepDecision {
        self.evaluate(&PolicyInputs {
            voltage,
            light_level,
            charging,
            overall_trend: None,
        })
    }

    /// Run the rule table and clamp the result to the configured bounds.
    pub fn evaluate(&self, inputs: &PolicyInputs) -> SleepDecision {
        let (rule, decision) = RULES
            .iter()
            .find_map(|rule| (rule.check)(self, inputs).map(|decision| (rule.name, decision)))
            // The last rule always applies
            .unwrap_or(("healthy", self.healthy()));

        let minutes = decision
            .minutes
            .clamp(self.sleep.min_minutes, self.sleep.longest_minutes());

        match decision.state {
            PowerState::Charging(evidence) => info!(
                "Charging detected via {} ({:.2}V, light={}): minimum sleep",
                evidence.label(),
                inputs.voltage,
                inputs.light_level
            ),
            PowerState::Conserving { ratio } => debug!(
                "Battery scaling: {:.2}V -> {:.2} ratio -> {} min",
                inputs.voltage, ratio, minutes
            ),
            _ => {}
        }
        info!(
            "Sleep decision [{}]: battery={:.2}V, light={}, sleep={} min",
            rule, inputs.voltage, inputs.light_level, minutes
        );

        SleepDecision { minutes, ..decision }
    }

    fn charge_evidence(&self, inputs: &PolicyInputs) -> Option<ChargeEvidence> {
        let t = &self.thresholds;
        let not_falling = inputs
            .overall_trend
            .is_none_or(|trend| trend > self.max_decline_v);

        if inputs.charging {
            Some(ChargeEvidence::VoltageTrend)
        } else if inputs.light_level > t.charging_light_level
            && inputs.voltage > t.light_charging_min_v
        {
            Some(ChargeEvidence::LightAndVoltage)
        } else if inputs.voltage > t.high_v && not_falling {
            Some(ChargeEvidence::HighVoltage)
        } else {
            None
        }
    }

    fn scaled(&self, voltage: f32) -> SleepDecision {
        let t = &self.thresholds;
        let s = &self.sleep;

        let ratio = ((voltage - t.low_v) / (t.full_v - t.low_v)).clamp(0.0, 1.0);
        let span = (s.max_scaled_minutes - s.min_minutes) as f32;
        let minutes = s.max_scaled_minutes as f32 - span * ratio;

        SleepDecision {
            minutes: (minutes + 0.5) as u32,
            state: PowerState::Conserving { ratio },
        }
    }

    fn healthy(&self) -> SleepDecision {
        SleepDecision {
            minutes: self.sleep.min_minutes,
            state: PowerState::Healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SleepPolicy {
        SleepPolicy::new(PowerThresholds::default(), SleepConfig::default())
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = SleepPolicy::rules().iter().map(|r| r.name).collect();
        assert_eq!(names, ["uvlo", "critical", "charging", "conserving", "healthy"]);
    }

    #[test]
    fn test_uvlo_overrides_everything() {
        let policy = policy();
        for light in [0, 2500, 4095] {
            for charging in [false, true] {
                let decision = policy.decide(3.55, light, charging);
                assert_eq!(decision.minutes, 2880);
                assert_eq!(decision.state, PowerState::Uvlo);
                assert!(decision.state.suppresses_radio());
            }
        }
        assert_eq!(policy.decide(3.6, 4095, true).state, PowerState::Uvlo);
    }

    #[test]
    fn test_critical_overrides_bright_light() {
        let decision = policy().decide(3.65, 4095, true);
        assert_eq!(decision.minutes, 1440);
        assert_eq!(decision.state, PowerState::Critical);
        assert!(decision.state.suppresses_radio());
    }

    #[test]
    fn test_charging_trend_gives_minimum_sleep() {
        let decision = policy().decide(3.80, 500, true);
        assert_eq!(decision.minutes, 120);
        assert_eq!(decision.state, PowerState::Charging(ChargeEvidence::VoltageTrend));
        assert!(!decision.state.suppresses_radio());
    }

    #[test]
    fn test_bright_light_with_reasonable_voltage_counts_as_charging() {
        let decision = policy().decide(3.95, 2500, false);
        assert_eq!(decision.state, PowerState::Charging(ChargeEvidence::LightAndVoltage));

        // Same light, voltage too low for the light indicator
        let decision = policy().decide(3.85, 2500, false);
        assert!(matches!(decision.state, PowerState::Conserving { .. }));
    }

    #[test]
    fn test_high_voltage_needs_non_falling_trend() {
        let policy = policy();
        let mut inputs = PolicyInputs {
            voltage: 4.15,
            light_level: 100,
            charging: false,
            overall_trend: Some(0.0),
        };
        assert_eq!(
            policy.evaluate(&inputs).state,
            PowerState::Charging(ChargeEvidence::HighVoltage)
        );

        inputs.overall_trend = Some(-0.05);
        assert!(matches!(policy.evaluate(&inputs).state, PowerState::Conserving { .. }));
    }

    #[test]
    fn test_interpolation_midband() {
        let decision = policy().decide(3.9, 100, false);
        assert_eq!(decision.minutes, 264);
        match decision.state {
            PowerState::Conserving { ratio } => assert!((ratio - 0.4).abs() < 1e-3),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_interpolation_band_edges_are_continuous() {
        let policy = policy();
        // Just above critical the scaled value is at its maximum
        assert_eq!(policy.decide(3.7001, 100, false).minutes, 360);
        // Approaching full it meets the minimum, and healthy continues it
        assert_eq!(policy.decide(4.1999, 100, false).minutes, 120);
        assert_eq!(policy.decide(4.2, 100, false).state, PowerState::Healthy);
        assert_eq!(policy.decide(4.2, 100, false).minutes, 120);
    }

    #[test]
    fn test_interpolation_is_monotonic() {
        let policy = policy();
        let mut previous = u32::MAX;
        let mut voltage = 3.701_f32;
        while voltage < 4.2 {
            // Keep below the light and high-voltage charging indicators
            let minutes = policy.decide(voltage, 0, false).minutes;
            assert!(minutes <= previous, "{}V gave {} after {}", voltage, minutes, previous);
            previous = minutes;
            voltage += 0.005;
        }
    }

    #[test]
    fn test_result_always_within_bounds() {
        let policy = policy();
        let sleep = SleepConfig::default();
        let voltages = [
            f32::NEG_INFINITY,
            -5.0,
            0.0,
            3.0,
            3.69,
            3.75,
            4.0,
            4.5,
            9.9,
            f32::INFINITY,
            f32::NAN,
        ];
        for v in voltages {
            for light in [0, 2001, 4095] {
                for charging in [false, true] {
                    let minutes = policy.decide(v, light, charging).minutes;
                    assert!(
                        (sleep.min_minutes..=sleep.longest_minutes()).contains(&minutes),
                        "{}V -> {}",
                        v,
                        minutes
                    );
                }
            }
        }
    }

    #[test]
    fn test_nan_voltage_is_treated_as_uvlo() {
        assert_eq!(policy().decide(f32::NAN, 4095, true).state, PowerState::Uvlo);
    }

    #[test]
    fn test_decision_duration() {
        let decision = policy().decide(3.55, 0, false);
        assert_eq!(decision.duration(), Duration::from_secs(2880 * 60));
    }

    #[test]
    fn test_first_applicable_rule_decides() {
        let policy = policy();
        let cases = [
            (3.55, 0, false, None, "uvlo"),
            (3.68, 4095, false, None, "critical"),
            (3.80, 100, true, None, "charging"),
            (3.95, 2500, false, None, "charging"),
            (4.15, 0, false, None, "charging"),
            (3.90, 100, false, None, "conserving"),
            (4.25, 100, false, Some(-0.05), "healthy"),
        ];
        for (voltage, light_level, charging, overall_trend, expected) in cases {
            let inputs = PolicyInputs {
                voltage,
                light_level,
                charging,
                overall_trend,
            };
            let first = SleepPolicy::rules()
                .iter()
                .find(|rule| rule.applies(&policy, &inputs))
                .map(|rule| rule.name);
            assert_eq!(first, Some(expected), "{}V", voltage);
        }
    }
}
