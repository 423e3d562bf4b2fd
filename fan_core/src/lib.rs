#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Fan test rig engine (hardware-agnostic).
//!
//! All hardware interaction goes through `fan_traits::EdgeSource` (tach input)
//! and `fan_traits::PwmOutput` (fan drive).
//!
//! ## Architecture
//!
//! - **Tach**: edge-driven EMA of the pulse period with watchdog-driven decay
//!   (`tach` module)
//! - **Drive**: percent duty on a fixed 25 kHz carrier (`pwm` module)
//! - **Rig**: tach + PWM pair that always stops the fan on exit (`rig` module)
//! - **Sampling**: one repetition of polling and averaging (`sample_loop` module)
//! - **Sequencing**: phases and repetitions of a validated plan (`sequencer`, `plan`)
//! - **Records**: per-poll and per-repetition output (`record` module)
//!
//! Cancellation is a shared `AtomicBool`, observed only between sleep slices.

pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod plan;
pub mod pwm;
pub mod record;
pub mod rig;
pub mod sample_loop;
pub mod sequencer;
pub mod tach;
pub mod util;

pub use config::{PERIOD_CAP_US, PWM_CARRIER_HZ, SamplingCfg, TachConfig, WATCHDOG_TIMEOUT_MS};
pub use error::{FanError, PlanError, Report, Result};
pub use plan::{PhasePlan, TestPlan};
pub use pwm::{PwmDriver, duty_to_native};
pub use record::{RecordSink, RepetitionCtx, RunRecord, SampleRecord};
pub use rig::FanRig;
pub use sample_loop::{RepetitionResult, SampleBuffer, SampleLoop, phase_average};
pub use sequencer::{SequenceSummary, TestSequencer};
pub use tach::{PeriodEstimate, TachReader, TachState};
