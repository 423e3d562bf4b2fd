use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FanError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid test plan: {0}")]
    Plan(#[from] PlanError),
    #[error("record sink error: {0}")]
    Record(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("duration {0} min out of range [1, {max}]", max = fan_config::MAX_DURATION_MIN)]
    Duration(u32),
    #[error("duty {0}% out of range [0, {max}]", max = fan_config::MAX_DUTY_PCT)]
    Duty(u8),
    #[error("repetitions {0} out of range [1, {max}]", max = fan_config::MAX_REPETITIONS)]
    Repetitions(u32),
    #[error("plan has no phases")]
    Empty,
    #[error("plan has {0} phases, at most {max} allowed", max = fan_config::MAX_PHASES)]
    TooManyPhases(usize),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
