//! One repetition: drive the fan at a fixed duty, poll RPM, average.
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use fan_traits::{Clock, EdgeSource, PwmOutput};

use crate::config::SamplingCfg;
use crate::error::Result;
use crate::plan::PhasePlan;
use crate::record::{RecordSink, RepetitionCtx};
use crate::rig::FanRig;
use crate::util::{round_half, sleep_unless_cancelled};

/// Settled RPM samples of one repetition, in poll order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f64>,
}

impl SampleBuffer {
    pub fn push(&mut self, rpm: f64) {
        self.samples.push(rpm);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn average(&self) -> f64 {
        phase_average(&self.samples)
    }
}

/// Phase average as the rig has always reported it: `sum / (count - 1)`.
///
/// Fewer than two samples give 0.
pub fn phase_average(samples: &[f64]) -> f64 {
    match samples.len() {
        0 | 1 => 0.0,
        n => samples.iter().sum::<f64>() / (n - 1) as f64,
    }
}

/// Result of one repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionResult {
    pub avg_rpm: f64,
    /// Settled samples that went into `avg_rpm`.
    pub samples: SampleBuffer,
    /// All polls taken, settled or not.
    pub polls: u32,
    pub cancelled: bool,
}

/// Runs a single repetition against an open rig.
pub struct SampleLoop<'a, C: Clock> {
    clock: &'a C,
    sampling: SamplingCfg,
    cancel: &'a AtomicBool,
}

impl<'a, C: Clock> SampleLoop<'a, C> {
    pub fn new(clock: &'a C, sampling: SamplingCfg, cancel: &'a AtomicBool) -> Self {
        Self {
            clock,
            sampling,
            cancel,
        }
    }

    /// Drive `rig` at the phase duty for the phase duration.
    ///
    /// The rig is stopped before returning on every path. Cancellation yields
    /// a partial result, not an error.
    pub fn run<E, P, S>(
        &self,
        rig: &mut FanRig<E, P>,
        phase: &PhasePlan,
        ctx: RepetitionCtx,
        sink: &mut S,
    ) -> Result<RepetitionResult>
    where
        E: EdgeSource,
        P: PwmOutput,
        S: RecordSink + ?Sized,
    {
        let outcome = self.drive(rig, phase, ctx, sink);
        rig.stop();
        let (samples, polls, cancelled) = outcome?;
        let avg_rpm = samples.average();
        tracing::info!(
            phase = ctx.phase_index + 1,
            repetition = ctx.repetition_index + 1,
            avg_rpm,
            settled = samples.len(),
            polls,
            cancelled,
            "repetition finished"
        );
        Ok(RepetitionResult {
            avg_rpm,
            samples,
            polls,
            cancelled,
        })
    }

    fn drive<E, P, S>(
        &self,
        rig: &mut FanRig<E, P>,
        phase: &PhasePlan,
        ctx: RepetitionCtx,
        sink: &mut S,
    ) -> Result<(SampleBuffer, u32, bool)>
    where
        E: EdgeSource,
        P: PwmOutput,
        S: RecordSink + ?Sized,
    {
        rig.set_duty(phase.duty_percent())?;
        let start: Instant = self.clock.now();
        let duration = phase.duration();
        let mut samples = SampleBuffer::default();
        let mut polls = 0u32;

        tracing::info!(
            phase = ctx.phase_index + 1,
            repetition = ctx.repetition_index + 1,
            duty_pct = phase.duty_percent(),
            duration_min = phase.duration_minutes(),
            "repetition started"
        );

        while self.clock.elapsed_since(start) < duration {
            if !sleep_unless_cancelled(
                self.clock,
                self.sampling.poll_interval(),
                self.sampling.cancel_poll,
                self.cancel,
            ) {
                tracing::info!(polls, "repetition cancelled");
                return Ok((samples, polls, true));
            }
            let elapsed = self.clock.elapsed_since(start);
            let rpm = round_half(rig.rpm());
            let settled = elapsed > self.sampling.settle_window;
            if settled {
                samples.push(rpm);
            }
            polls = polls.saturating_add(1);
            tracing::info!(
                elapsed_s = elapsed.as_secs(),
                rpm,
                settled,
                state = ?rig.tach().state(),
                "rpm sample"
            );
            sink.sample(&ctx.sample(elapsed, rpm, settled))
                .wrap_err("record rpm sample")?;
        }
        Ok((samples, polls, false))
    }
}

/// Polls expected for a phase of `duration` at `interval`, settled or not.
pub fn expected_polls(duration: Duration, interval: Duration) -> u64 {
    if interval.is_zero() {
        return 0;
    }
    duration.as_nanos().div_ceil(interval.as_nanos()) as u64
}
