//! Runs a whole test plan, one repetition at a time.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use fan_traits::{BoxError, Clock, EdgeSource, PwmOutput};

use crate::config::{SamplingCfg, TachConfig};
use crate::error::Result;
use crate::hw_error::report;
use crate::plan::TestPlan;
use crate::record::{RecordSink, RepetitionCtx, RunRecord};
use crate::rig::FanRig;
use crate::sample_loop::{SampleLoop, expected_polls};
use crate::util::sleep_unless_cancelled;

/// What a sequencer run got through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceSummary {
    pub repetitions_run: u64,
    pub cancelled: bool,
    /// Records in the order they were emitted.
    pub runs: Vec<RunRecord>,
}

pub struct TestSequencer<C: Clock> {
    clock: C,
    tach: TachConfig,
    sampling: SamplingCfg,
    cancel: Arc<AtomicBool>,
}

impl<C: Clock> TestSequencer<C> {
    pub fn new(clock: C, tach: TachConfig, sampling: SamplingCfg, cancel: Arc<AtomicBool>) -> Self {
        Self {
            clock,
            tach,
            sampling,
            cancel,
        }
    }

    /// Run every phase's repetitions in plan order.
    ///
    /// `open_rig` is called once per repetition for a fresh tach/PWM pair;
    /// failing to acquire hardware is fatal. One `RunRecord` reaches `sink`
    /// per repetition started, cancelled ones included.
    pub fn run<E, P, F, S>(
        &self,
        plan: &TestPlan,
        mut open_rig: F,
        sink: &mut S,
    ) -> Result<SequenceSummary>
    where
        E: EdgeSource,
        P: PwmOutput,
        F: FnMut() -> std::result::Result<(E, P), BoxError>,
        S: RecordSink + ?Sized,
    {
        let mut summary = SequenceSummary::default();
        let sample_loop = SampleLoop::new(&self.clock, self.sampling, &self.cancel);
        tracing::info!(
            phases = plan.len(),
            repetitions = plan.total_repetitions(),
            "test sequence started"
        );

        'plan: for (phase_index, phase) in plan.iter().enumerate() {
            tracing::info!(
                phase = phase_index + 1,
                duty_pct = phase.duty_percent(),
                duration_min = phase.duration_minutes(),
                repetitions = phase.repetitions(),
                expected_polls = expected_polls(phase.duration(), self.sampling.poll_interval()),
                "phase started"
            );
            for repetition_index in 0..phase.repetitions() {
                if summary.repetitions_run > 0
                    && !sleep_unless_cancelled(
                        &self.clock,
                        self.sampling.inter_repetition_delay,
                        self.sampling.cancel_poll,
                        &self.cancel,
                    )
                {
                    summary.cancelled = true;
                    break 'plan;
                }
                if self.cancel.load(Ordering::Relaxed) {
                    summary.cancelled = true;
                    break 'plan;
                }

                let ctx = RepetitionCtx {
                    phase_index,
                    repetition_index,
                    duration_minutes: phase.duration_minutes(),
                    duty_percent: phase.duty_percent(),
                };
                let (source, out) = open_rig()
                    .map_err(|e| report(&e))
                    .wrap_err("open fan hardware")?;
                let mut rig = FanRig::open(source, out, self.tach, self.sampling.carrier_hz)
                    .wrap_err_with(|| {
                        format!(
                            "start rig for phase {} repetition {}",
                            phase_index + 1,
                            repetition_index + 1
                        )
                    })?;
                let result = sample_loop.run(&mut rig, phase, ctx, sink)?;
                drop(rig);

                let record = ctx.run(result.avg_rpm, result.cancelled);
                sink.run(&record).wrap_err("record repetition result")?;
                summary.runs.push(record);
                summary.repetitions_run += 1;

                if result.cancelled {
                    summary.cancelled = true;
                    break 'plan;
                }
            }
        }

        if summary.cancelled {
            tracing::warn!(
                repetitions_run = summary.repetitions_run,
                "test sequence cancelled, remaining plan aborted"
            );
        } else {
            tracing::info!(
                repetitions_run = summary.repetitions_run,
                "test sequence complete"
            );
        }
        Ok(summary)
    }
}
