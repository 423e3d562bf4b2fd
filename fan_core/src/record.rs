//! Records handed to the persistence collaborator.
use std::time::Duration;

use crate::error::Result;

/// Position of a repetition inside the plan (both indices zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepetitionCtx {
    pub phase_index: usize,
    pub repetition_index: u32,
    pub duration_minutes: u32,
    pub duty_percent: u8,
}

/// One RPM poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub phase_index: usize,
    pub repetition_index: u32,
    pub duration_minutes: u32,
    pub duty_percent: u8,
    /// Time since the repetition started.
    pub elapsed: Duration,
    /// Reading rounded to the nearest 0.5 RPM.
    pub rpm: f64,
    /// Past the settling window, i.e. included in the average.
    pub settled: bool,
}

/// Outcome of one repetition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRecord {
    pub phase_index: usize,
    pub repetition_index: u32,
    pub duration_minutes: u32,
    pub duty_percent: u8,
    pub avg_rpm: f64,
    pub cancelled: bool,
}

impl RepetitionCtx {
    pub fn sample(&self, elapsed: Duration, rpm: f64, settled: bool) -> SampleRecord {
        SampleRecord {
            phase_index: self.phase_index,
            repetition_index: self.repetition_index,
            duration_minutes: self.duration_minutes,
            duty_percent: self.duty_percent,
            elapsed,
            rpm,
            settled,
        }
    }

    pub fn run(&self, avg_rpm: f64, cancelled: bool) -> RunRecord {
        RunRecord {
            phase_index: self.phase_index,
            repetition_index: self.repetition_index,
            duration_minutes: self.duration_minutes,
            duty_percent: self.duty_percent,
            avg_rpm,
            cancelled,
        }
    }
}

/// Receives per-poll and per-repetition records.
pub trait RecordSink {
    /// Called for every poll. Ignored by default.
    fn sample(&mut self, _rec: &SampleRecord) -> Result<()> {
        Ok(())
    }

    /// Called once per repetition, completed or cancelled.
    fn run(&mut self, rec: &RunRecord) -> Result<()>;
}

impl<T: RecordSink + ?Sized> RecordSink for &mut T {
    fn sample(&mut self, rec: &SampleRecord) -> Result<()> {
        (**self).sample(rec)
    }

    fn run(&mut self, rec: &RunRecord) -> Result<()> {
        (**self).run(rec)
    }
}
