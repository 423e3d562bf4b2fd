//! Validated test plan: ordered phases of (duration, duty, repetitions).
use std::time::Duration;

use fan_config::{MAX_DURATION_MIN, MAX_DUTY_PCT, MAX_PHASES, MAX_REPETITIONS};

use crate::error::PlanError;

/// One phase of a test plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePlan {
    duration_minutes: u32,
    duty_percent: u8,
    repetitions: u32,
}

impl PhasePlan {
    pub fn new(
        duration_minutes: u32,
        duty_percent: u8,
        repetitions: u32,
    ) -> Result<Self, PlanError> {
        if !(1..=MAX_DURATION_MIN).contains(&duration_minutes) {
            return Err(PlanError::Duration(duration_minutes));
        }
        if duty_percent > MAX_DUTY_PCT {
            return Err(PlanError::Duty(duty_percent));
        }
        if !(1..=MAX_REPETITIONS).contains(&repetitions) {
            return Err(PlanError::Repetitions(repetitions));
        }
        Ok(Self {
            duration_minutes,
            duty_percent,
            repetitions,
        })
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn duty_percent(&self) -> u8 {
        self.duty_percent
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    /// Length of one repetition.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_minutes) * 60)
    }
}

/// Ordered, non-empty list of at most `MAX_PHASES` phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    phases: Vec<PhasePlan>,
}

impl TestPlan {
    pub fn new(phases: Vec<PhasePlan>) -> Result<Self, PlanError> {
        if phases.is_empty() {
            return Err(PlanError::Empty);
        }
        if phases.len() > MAX_PHASES {
            return Err(PlanError::TooManyPhases(phases.len()));
        }
        Ok(Self { phases })
    }

    pub fn phases(&self) -> &[PhasePlan] {
        &self.phases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PhasePlan> {
        self.phases.iter()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn total_repetitions(&self) -> u64 {
        self.phases.iter().map(|p| u64::from(p.repetitions)).sum()
    }
}

impl<'a> IntoIterator for &'a TestPlan {
    type Item = &'a PhasePlan;
    type IntoIter = std::slice::Iter<'a, PhasePlan>;

    fn into_iter(self) -> Self::IntoIter {
        self.phases.iter()
    }
}
