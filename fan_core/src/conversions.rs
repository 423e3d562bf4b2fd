//! Bridges from `fan_config` types to `fan_core` types.

use std::time::Duration;

use crate::config::{SamplingCfg, TachConfig};
use crate::error::PlanError;
use crate::plan::{PhasePlan, TestPlan};

// ── TachConfig ───────────────────────────────────────────────────────────────

impl From<&fan_config::TachCfg> for TachConfig {
    fn from(c: &fan_config::TachCfg) -> Self {
        Self::new(c.pulses_per_rev, c.weighting, c.min_rpm)
    }
}

// ── SamplingCfg ──────────────────────────────────────────────────────────────

impl From<&fan_config::SamplingCfg> for SamplingCfg {
    fn from(c: &fan_config::SamplingCfg) -> Self {
        Self {
            sample_interval: Duration::from_secs(c.sample_interval_s),
            settle_window: Duration::from_secs(c.settle_s),
            inter_repetition_delay: Duration::from_secs(c.inter_repetition_s),
            carrier_hz: c.carrier_hz,
            ..Self::default()
        }
    }
}

// ── Plan ─────────────────────────────────────────────────────────────────────

impl TryFrom<&fan_config::PhaseCfg> for PhasePlan {
    type Error = PlanError;

    fn try_from(c: &fan_config::PhaseCfg) -> Result<Self, Self::Error> {
        Self::new(c.duration_min, c.duty_pct, c.repetitions)
    }
}

impl TryFrom<&[fan_config::PhaseCfg]> for TestPlan {
    type Error = PlanError;

    fn try_from(phases: &[fan_config::PhaseCfg]) -> Result<Self, Self::Error> {
        let phases = phases
            .iter()
            .map(PhasePlan::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(phases)
    }
}

impl TryFrom<&fan_config::Config> for TestPlan {
    type Error = PlanError;

    fn try_from(c: &fan_config::Config) -> Result<Self, Self::Error> {
        Self::try_from(c.phases.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_values_flow_into_core_types() {
        let cfg = fan_config::load_toml(
            r#"
[tach]
pulses_per_rev = 2.0
weighting = 1.5
min_rpm = 0.0

[sampling]
sample_interval_s = 1
settle_s = 3
inter_repetition_s = 0
carrier_hz = 100

[[phase]]
duration_min = 2
duty_pct = 40
repetitions = 3
"#,
        )
        .unwrap();

        let tach = TachConfig::from(&cfg.tach);
        assert_eq!(tach.pulses_per_rev(), 2.0);
        assert_eq!(tach.weighting(), 0.99);
        assert_eq!(tach.min_rpm(), 1.0);

        let sampling = SamplingCfg::from(&cfg.sampling);
        assert_eq!(sampling.sample_interval, Duration::from_secs(1));
        assert_eq!(sampling.settle_window, Duration::from_secs(3));
        assert_eq!(sampling.inter_repetition_delay, Duration::ZERO);
        assert_eq!(sampling.carrier_hz, 100);
        assert_eq!(sampling.cancel_poll, Duration::from_millis(100));

        let plan = TestPlan::try_from(&cfg).unwrap();
        assert_eq!(plan.phases(), &[PhasePlan::new(2, 40, 3).unwrap()]);
    }

    #[test]
    fn empty_phase_list_is_not_a_plan() {
        let cfg = fan_config::Config::default();
        assert_eq!(TestPlan::try_from(&cfg), Err(PlanError::Empty));
    }
}
