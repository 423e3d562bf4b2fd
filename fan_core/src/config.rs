//! Runtime configuration for the tach engine and the sampling loop.
//!
//! These are separate from the TOML-deserialized config in `fan_config`;
//! see `conversions` for the mapping.
use std::time::Duration;

/// Watchdog window armed on the tach line.
pub const WATCHDOG_TIMEOUT_MS: u32 = 200;
/// Period estimates at or above this no longer inflate on watchdog timeouts.
pub const PERIOD_CAP_US: f64 = 2_000_000_000.0;
/// Fixed PWM carrier frequency.
pub const PWM_CARRIER_HZ: u32 = 25_000;

const WEIGHTING_MAX: f64 = 0.99;
const MIN_RPM_RANGE: (f64, f64) = (1.0, 1000.0);

/// Tach conversion and smoothing parameters.
///
/// Out-of-range values are clamped at construction, never rejected. The
/// old/new weight split is fixed here and never renormalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TachConfig {
    pulses_per_rev: f64,
    old_weight: f64,
    new_weight: f64,
    min_rpm: f64,
}

impl Default for TachConfig {
    fn default() -> Self {
        Self::new(1.0, 0.0, 5.0)
    }
}

impl TachConfig {
    /// Build a config, clamping `weighting` into [0, 0.99] and `min_rpm`
    /// into [1, 1000]. Non-finite inputs take the lower bound.
    pub fn new(pulses_per_rev: f64, weighting: f64, min_rpm: f64) -> Self {
        let weighting = if weighting.is_finite() {
            weighting.clamp(0.0, WEIGHTING_MAX)
        } else {
            0.0
        };
        let min_rpm = if min_rpm.is_finite() {
            min_rpm.clamp(MIN_RPM_RANGE.0, MIN_RPM_RANGE.1)
        } else {
            MIN_RPM_RANGE.0
        };
        let pulses_per_rev = if pulses_per_rev.is_finite() {
            pulses_per_rev.max(0.0)
        } else {
            0.0
        };
        Self {
            pulses_per_rev,
            old_weight: weighting,
            new_weight: 1.0 - weighting,
            min_rpm,
        }
    }

    pub fn pulses_per_rev(&self) -> f64 {
        self.pulses_per_rev
    }

    /// Weight retained by the previous estimate.
    pub fn weighting(&self) -> f64 {
        self.old_weight
    }

    /// Weight given to each new period measurement.
    pub fn new_weight(&self) -> f64 {
        self.new_weight
    }

    pub fn min_rpm(&self) -> f64 {
        self.min_rpm
    }

    pub fn watchdog_timeout_ms(&self) -> u32 {
        WATCHDOG_TIMEOUT_MS
    }
}

/// Timing of one repetition and of the gaps between repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingCfg {
    /// Time between RPM polls.
    pub sample_interval: Duration,
    /// Polls at or before this much elapsed time are not averaged.
    pub settle_window: Duration,
    /// Pause between consecutive repetitions.
    pub inter_repetition_delay: Duration,
    /// Granularity at which sleeps observe cancellation.
    pub cancel_poll: Duration,
    /// PWM carrier frequency.
    pub carrier_hz: u32,
}

impl SamplingCfg {
    /// Interval actually slept between polls: never shorter than one
    /// cancellation slice, so a zero `sample_interval` cannot spin.
    pub fn poll_interval(&self) -> Duration {
        self.sample_interval
            .max(self.cancel_poll)
            .max(Duration::from_millis(1))
    }
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(10),
            settle_window: Duration::from_secs(30),
            inter_repetition_delay: Duration::from_secs(3),
            cancel_poll: Duration::from_millis(100),
            carrier_hz: PWM_CARRIER_HZ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(-0.5, 0.0)]
    #[case(0.0, 0.0)]
    #[case(0.25, 0.25)]
    #[case(0.99, 0.99)]
    #[case(1.0, 0.99)]
    #[case(f64::NAN, 0.0)]
    fn weighting_is_clamped(#[case] input: f64, #[case] expected: f64) {
        let cfg = TachConfig::new(1.0, input, 5.0);
        assert_eq!(cfg.weighting(), expected);
        assert!((cfg.weighting() + cfg.new_weight() - 1.0).abs() < 1e-12);
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(5.0, 5.0)]
    #[case(5000.0, 1000.0)]
    #[case(f64::INFINITY, 1.0)]
    fn min_rpm_is_clamped(#[case] input: f64, #[case] expected: f64) {
        assert_eq!(TachConfig::new(1.0, 0.0, input).min_rpm(), expected);
    }

    #[test]
    fn defaults_match_reference_rig() {
        let cfg = TachConfig::default();
        assert_eq!(cfg.pulses_per_rev(), 1.0);
        assert_eq!(cfg.weighting(), 0.0);
        assert_eq!(cfg.min_rpm(), 5.0);
        assert_eq!(cfg.watchdog_timeout_ms(), 200);

        let s = SamplingCfg::default();
        assert_eq!(s.sample_interval, Duration::from_secs(10));
        assert_eq!(s.settle_window, Duration::from_secs(30));
        assert_eq!(s.inter_repetition_delay, Duration::from_secs(3));
        assert_eq!(s.carrier_hz, 25_000);
    }
}
