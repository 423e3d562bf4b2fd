//! Full sequence against the threaded simulated fan, on an accelerated clock.
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use fan_core::mocks::VecSink;
use fan_core::{PhasePlan, SamplingCfg, TachConfig, TestPlan, TestSequencer};
use fan_hardware::{FanModel, SimulatedFan};
use fan_traits::{BoxError, ScaledClock};

#[test]
fn simulated_fan_speed_tracks_duty() {
    // 60 s of rig time per repetition in 0.6 s of wall time.
    let clock = ScaledClock::new(100);
    let plan = TestPlan::new(vec![
        PhasePlan::new(1, 50, 1).unwrap(),
        PhasePlan::new(1, 0, 1).unwrap(),
    ])
    .unwrap();
    let seq = TestSequencer::new(
        clock,
        TachConfig::new(1.0, 0.8, 5.0),
        SamplingCfg::default(),
        Arc::new(AtomicBool::new(false)),
    );
    let mut sink = VecSink::default();
    let summary = seq
        .run(
            &plan,
            || -> Result<_, BoxError> { Ok(SimulatedFan::new(FanModel::default())) },
            &mut sink,
        )
        .unwrap();

    assert_eq!(summary.repetitions_run, 2);
    assert!(!summary.cancelled);

    // Per-sample readings, not the average: wall-clock jitter decides how many
    // polls land past the settling window.
    let driven: Vec<_> = sink
        .samples
        .iter()
        .filter(|s| s.phase_index == 0 && s.settled)
        .map(|s| s.rpm)
        .collect();
    assert!(!driven.is_empty());
    for rpm in &driven {
        assert!((1200.0..=1800.0).contains(rpm), "50% duty read {rpm} rpm");
    }

    let stopped: Vec<_> = sink
        .samples
        .iter()
        .filter(|s| s.phase_index == 1)
        .map(|s| s.rpm)
        .collect();
    assert!(stopped.iter().all(|&rpm| rpm == 0.0), "{stopped:?}");
}
