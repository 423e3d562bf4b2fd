//! Backend assembly and command execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use fan_core::{
    FanRig, SamplingCfg, SequenceSummary, TachConfig, TestPlan, TestSequencer,
    util::sleep_unless_cancelled,
};
use fan_traits::{BoxError, Clock, EdgeSource, MonotonicClock, PwmOutput, ScaledClock};
use fan_ui::{LinePrompt, RunOutcome, Session};

use crate::record::CsvRecordSink;

/// Speeds up rig time for the simulated backend (tests only).
const TIME_SCALE_ENV: &str = "FAN_TEST_TIME_SCALE";
/// Makes backend initialisation fail (tests only).
const FAIL_INIT_ENV: &str = "FAN_TEST_SIM_FAIL_INIT";

pub type Backend = (Box<dyn EdgeSource>, Box<dyn PwmOutput>);

/// Open the tach input and PWM output described by the config.
pub fn open_backend(cfg: &fan_config::Config) -> Result<Backend, BoxError> {
    if std::env::var_os(FAIL_INIT_ENV).is_some() {
        return Err(Box::new(fan_hardware::error::HwError::Gpio(format!(
            "tach pin {}: simulated init failure",
            cfg.pins.tach_gpio
        ))));
    }

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let tach = fan_hardware::rpi::GpioTach::new(cfg.pins.tach_gpio)?;
        let pwm = fan_hardware::rpi::HardwarePwm::new(cfg.pins.pwm_gpio, cfg.sampling.carrier_hz)?;
        tracing::debug!(
            tach_gpio = cfg.pins.tach_gpio,
            pwm_gpio = cfg.pins.pwm_gpio,
            "hardware backend opened"
        );
        Ok((Box::new(tach), Box::new(pwm)))
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        let model = fan_hardware::FanModel {
            pulses_per_rev: cfg.tach.pulses_per_rev,
            ..fan_hardware::FanModel::default()
        };
        let (tach, pwm) = fan_hardware::SimulatedFan::new(model);
        tracing::debug!("simulated backend opened");
        Ok((Box::new(tach), Box::new(pwm)))
    }
}

/// Real time, or accelerated time when the test hook asks for it.
pub fn make_clock() -> Box<dyn Clock> {
    match std::env::var(TIME_SCALE_ENV)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
    {
        Some(factor) if factor > 1 => {
            tracing::debug!(factor, "using accelerated clock");
            Box::new(ScaledClock::new(factor))
        }
        _ => Box::new(MonotonicClock::new()),
    }
}

pub fn output_dir(cfg: &fan_config::Config, flag: Option<&PathBuf>) -> PathBuf {
    flag.cloned().unwrap_or_else(|| cfg.output.dir.clone())
}

/// Run `plan` once, recording into a fresh raw file under `dir`.
pub fn run_plan(
    cfg: &fan_config::Config,
    plan: &TestPlan,
    dir: &Path,
    cancel: Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<SequenceSummary> {
    if cancel.load(Ordering::Relaxed) {
        tracing::info!("cancelled before start, nothing recorded");
        return Ok(SequenceSummary {
            cancelled: true,
            ..SequenceSummary::default()
        });
    }
    let clock = make_clock();
    let tach = TachConfig::from(&cfg.tach);
    let sampling = SamplingCfg::from(&cfg.sampling);
    let mut sink = CsvRecordSink::create(dir)?;
    let run_id = sink.run_id().to_string();

    let seq = TestSequencer::new(&*clock, tach, sampling, cancel);
    let summary = seq.run(plan, || open_backend(cfg), &mut sink)?;
    sink.finish()?;

    print_results(&run_id, &summary, json);
    Ok(summary)
}

fn print_results(run_id: &str, summary: &SequenceSummary, json: bool) {
    if json {
        for r in &summary.runs {
            println!(
                "{}",
                serde_json::json!({
                    "run": run_id,
                    "phase": r.phase_index + 1,
                    "repetition": r.repetition_index + 1,
                    "duration_min": r.duration_minutes,
                    "pwm_pct": r.duty_percent,
                    "avg_rpm": r.avg_rpm,
                    "cancelled": r.cancelled,
                })
            );
        }
        println!(
            "{}",
            serde_json::json!({
                "run": run_id,
                "repetitions": summary.repetitions_run,
                "cancelled": summary.cancelled,
            })
        );
        return;
    }

    println!("\nTEST RESULTS ({run_id}):\n");
    for r in &summary.runs {
        println!(
            "Phase = {}, Duration = {} min, Repetition = {}, PWM = {} %, Avg RPM = {:.1}{}",
            r.phase_index + 1,
            r.duration_minutes,
            r.repetition_index + 1,
            r.duty_percent,
            r.avg_rpm,
            if r.cancelled { " (cancelled)" } else { "" }
        );
    }
    if summary.cancelled {
        println!("\nTest cancelled after {} repetition(s).", summary.repetitions_run);
    } else {
        println!("\nTest complete: {} repetition(s).", summary.repetitions_run);
    }
}

/// `run`: execute the config's plan.
pub fn cmd_run(
    cfg: &fan_config::Config,
    output: Option<&PathBuf>,
    cancel: Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<SequenceSummary> {
    let plan = TestPlan::try_from(cfg).wrap_err("build test plan from [[phase]] entries")?;
    run_plan(cfg, &plan, &output_dir(cfg, output), cancel, json)
}

/// `interactive`: operator session on stdin/stdout. Returns true if cancelled.
///
/// Ctrl-C at a prompt ends the session once the pending answer (or end of
/// input) arrives; no plan is started after it.
pub fn cmd_interactive(
    cfg: &fan_config::Config,
    output: Option<&PathBuf>,
    cancel: Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<bool> {
    let dir = output_dir(cfg, output);
    let stdin = std::io::stdin();
    let mut session = Session::with_cancel(
        LinePrompt::new(stdin.lock(), std::io::stdout()),
        cancel.clone(),
    );
    let mut cancelled = false;
    session.run(|plan| {
        let summary = run_plan(cfg, plan, &dir, cancel.clone(), json)?;
        cancelled = summary.cancelled;
        Ok(if summary.cancelled {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        })
    })?;
    Ok(cancelled || session.cancelled())
}

/// `self-check`: spin at `duty` for `seconds`, report the speed, stop.
///
/// Returns `None` when interrupted before the reading was taken.
pub fn cmd_self_check(
    cfg: &fan_config::Config,
    duty: u8,
    seconds: u64,
    cancel: &AtomicBool,
    json: bool,
) -> eyre::Result<Option<f64>> {
    let clock = make_clock();
    let (source, out) = open_backend(cfg)
        .map_err(|e| eyre::Report::new(fan_core::hw_error::map_hw_error(&*e)))
        .wrap_err("open fan hardware")?;
    let mut rig = FanRig::open(
        source,
        out,
        TachConfig::from(&cfg.tach),
        cfg.sampling.carrier_hz,
    )?;
    rig.set_duty(duty)?;
    let completed = sleep_unless_cancelled(
        &*clock,
        Duration::from_secs(seconds),
        Duration::from_millis(100),
        cancel,
    );
    let rpm = rig.rpm();
    let state = rig.tach().state();
    rig.stop();

    if !completed || cancel.load(Ordering::Relaxed) {
        return Ok(None);
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "self_check": "ok", "duty_pct": duty, "rpm": rpm, "state": format!("{state:?}") })
        );
    } else {
        println!("self-check ok: {rpm:.1} rpm at {duty}% ({state:?})");
    }
    Ok(Some(rpm))
}
