#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the fan test rig.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Tach tuning (`weighting`, `min_rpm`) is never rejected here; the core
//!   clamps it into range at construction.
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Longest accepted phase, in minutes (1000 hours).
pub const MAX_DURATION_MIN: u32 = 60_000;
/// Highest accepted PWM duty, in percent.
pub const MAX_DUTY_PCT: u8 = 95;
/// Most repetitions accepted for one phase.
pub const MAX_REPETITIONS: u32 = 1000;
/// Most phases accepted in one plan.
pub const MAX_PHASES: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    /// BCM line of the tach input.
    pub tach_gpio: u8,
    /// BCM line of the hardware PWM output.
    pub pwm_gpio: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            tach_gpio: 4,
            pwm_gpio: 19,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TachCfg {
    pub pulses_per_rev: f64,
    /// Retained weight of the previous period estimate; clamped to [0, 0.99].
    pub weighting: f64,
    /// Readings below this are reported as 0; clamped to [1, 1000].
    pub min_rpm: f64,
}

impl Default for TachCfg {
    fn default() -> Self {
        Self {
            pulses_per_rev: 1.0,
            weighting: 0.0,
            min_rpm: 5.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingCfg {
    /// Seconds between RPM polls.
    pub sample_interval_s: u64,
    /// Polls at or before this many seconds into a repetition are not averaged.
    pub settle_s: u64,
    /// Pause between consecutive repetitions.
    pub inter_repetition_s: u64,
    /// PWM carrier frequency.
    pub carrier_hz: u32,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        Self {
            sample_interval_s: 10,
            settle_s: 30,
            inter_repetition_s: 3,
            carrier_hz: 25_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Output {
    /// Directory receiving the raw and summary CSV files.
    pub dir: PathBuf,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("fan_data"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// One `[[phase]]` entry of the test plan.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCfg {
    pub duration_min: u32,
    pub duty_pct: u8,
    #[serde(default = "one")]
    pub repetitions: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pins: Pins,
    #[serde(default)]
    pub tach: TachCfg,
    #[serde(default)]
    pub sampling: SamplingCfg,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    /// Ordered test plan.
    #[serde(default, rename = "phase")]
    pub phases: Vec<PhaseCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse, and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl PhaseCfg {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.duration_min == 0 || self.duration_min > MAX_DURATION_MIN {
            eyre::bail!("phase.duration_min must be in [1, {MAX_DURATION_MIN}]");
        }
        if self.duty_pct > MAX_DUTY_PCT {
            eyre::bail!("phase.duty_pct must be in [0, {MAX_DUTY_PCT}]");
        }
        if self.repetitions == 0 || self.repetitions > MAX_REPETITIONS {
            eyre::bail!("phase.repetitions must be in [1, {MAX_REPETITIONS}]");
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Tach
        if !self.tach.pulses_per_rev.is_finite() || self.tach.pulses_per_rev < 0.0 {
            eyre::bail!("tach.pulses_per_rev must be a finite value >= 0");
        }

        // Sampling
        if self.sampling.sample_interval_s == 0 {
            eyre::bail!("sampling.sample_interval_s must be >= 1");
        }
        if self.sampling.sample_interval_s > 24 * 60 * 60 {
            eyre::bail!("sampling.sample_interval_s is unreasonably large (>24h)");
        }
        if self.sampling.carrier_hz == 0 {
            eyre::bail!("sampling.carrier_hz must be > 0");
        }

        // Pins
        if self.pins.tach_gpio == self.pins.pwm_gpio {
            eyre::bail!("pins.tach_gpio and pins.pwm_gpio must differ");
        }

        // Plan
        if self.phases.len() > MAX_PHASES {
            eyre::bail!("at most {MAX_PHASES} [[phase]] entries are allowed");
        }
        for (i, phase) in self.phases.iter().enumerate() {
            phase
                .validate()
                .map_err(|e| eyre::eyre!("phase {}: {}", i + 1, e))?;
        }

        Ok(())
    }
}
