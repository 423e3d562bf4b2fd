//! GPIO backends for the fan rig.
//!
//! The simulated backend is always available and models a fan whose speed is
//! proportional to the applied PWM duty. The Raspberry Pi backend (`rpi`) is
//! compiled with the `hardware` feature.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;
pub mod util;

use crossbeam_channel as xch;
use fan_traits::{BoxError, EdgeEvent, EdgeSink, EdgeSource, PWM_DUTY_RANGE, PwmOutput};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::error::HwError;

/// Upper bound on how long the simulation thread waits before re-reading the duty.
const SIM_IDLE_POLL: Duration = Duration::from_millis(20);

/// Physical model behind the simulated fan.
#[derive(Debug, Clone, Copy)]
pub struct FanModel {
    /// Speed at 100% duty.
    pub max_rpm: f64,
    /// Tach pulses emitted per revolution.
    pub pulses_per_rev: f64,
    /// Initial value of the tick counter; set near `u32::MAX` to exercise wraparound.
    pub tick_origin: u32,
}

impl Default for FanModel {
    fn default() -> Self {
        Self {
            max_rpm: 3000.0,
            pulses_per_rev: 1.0,
            tick_origin: 0,
        }
    }
}

impl FanModel {
    /// Interval between tach pulses at `duty`, or `None` when the rotor is stopped.
    pub fn edge_period(&self, duty: u32) -> Option<Duration> {
        let frac = f64::from(duty.min(PWM_DUTY_RANGE)) / f64::from(PWM_DUTY_RANGE);
        let pulses_per_sec = self.max_rpm * frac * self.pulses_per_rev / 60.0;
        if !pulses_per_sec.is_finite() || pulses_per_sec <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / pulses_per_sec).ok()
    }
}

/// Simulated fan: one tach input and one PWM output sharing a rotor.
pub struct SimulatedFan;

impl SimulatedFan {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(model: FanModel) -> (SimulatedTach, SimulatedPwm) {
        let duty = Arc::new(AtomicU32::new(0));
        let tach = SimulatedTach::spawn(model, duty.clone());
        (tach, SimulatedPwm { duty })
    }
}

/// PWM half of the simulated fan.
pub struct SimulatedPwm {
    duty: Arc<AtomicU32>,
}

impl SimulatedPwm {
    /// Duty currently applied to the rotor.
    pub fn duty(&self) -> u32 {
        self.duty.load(Ordering::Relaxed)
    }
}

impl PwmOutput for SimulatedPwm {
    fn set_pwm(&mut self, frequency_hz: u32, duty: u32) -> Result<(), BoxError> {
        if frequency_hz == 0 {
            return Err(Box::new(HwError::Pwm("frequency must be > 0".into())));
        }
        if duty > PWM_DUTY_RANGE {
            return Err(Box::new(HwError::Pwm(format!(
                "duty {duty} exceeds range {PWM_DUTY_RANGE}"
            ))));
        }
        self.duty.store(duty, Ordering::Relaxed);
        tracing::debug!(frequency_hz, duty, "sim pwm set");
        Ok(())
    }
}

enum SimCmd {
    Subscribe(EdgeSink),
    Unsubscribe,
    Watchdog(Option<Duration>),
}

/// Tach half of the simulated fan.
///
/// Owns a background thread that emits rising edges at the rotor's pulse rate
/// and synthesises watchdog timeouts while the rotor is stopped. The thread is
/// shut down and joined when the tach is dropped.
pub struct SimulatedTach {
    cmd_tx: xch::Sender<SimCmd>,
    subscribed: bool,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl SimulatedTach {
    fn spawn(model: FanModel, duty: Arc<AtomicU32>) -> Self {
        let (cmd_tx, cmd_rx) = xch::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let epoch = Instant::now();
            let mut sink: Option<EdgeSink> = None;
            let mut watchdog: Option<Duration> = None;
            let mut next_edge: Option<Instant> = None;
            let mut last_activity = epoch;

            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sim tach thread received shutdown signal");
                    break;
                }

                let now = Instant::now();
                let period = model.edge_period(duty.load(Ordering::Relaxed));
                next_edge = match (period, next_edge) {
                    (None, _) => None,
                    (Some(p), None) => Some(now + p),
                    (Some(_), pending) => pending,
                };
                let wd_deadline = watchdog.map(|w| last_activity + w);
                let mut deadline = now + SIM_IDLE_POLL;
                for d in [next_edge, wd_deadline].into_iter().flatten() {
                    deadline = deadline.min(d);
                }

                match cmd_rx.recv_deadline(deadline) {
                    Ok(SimCmd::Subscribe(s)) => {
                        sink = Some(s);
                        continue;
                    }
                    Ok(SimCmd::Unsubscribe) => {
                        sink = None;
                        continue;
                    }
                    Ok(SimCmd::Watchdog(w)) => {
                        watchdog = w;
                        last_activity = Instant::now();
                        continue;
                    }
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Err(xch::RecvTimeoutError::Disconnected) => {
                        tracing::debug!("sim tach owner disconnected, exiting thread");
                        break;
                    }
                }

                let now = Instant::now();
                let tick = util::micros_tick(epoch, model.tick_origin, now);
                if next_edge.is_some_and(|t| t <= now) {
                    if let Some(s) = sink.as_mut() {
                        s(EdgeEvent::rising(tick));
                    }
                    last_activity = now;
                    next_edge = period.map(|p| now + p);
                } else if wd_deadline.is_some_and(|t| t <= now) {
                    if let Some(s) = sink.as_mut() {
                        s(EdgeEvent::timeout(tick));
                    }
                    last_activity = now;
                }
            }
            tracing::trace!("sim tach thread exiting cleanly");
        });

        Self {
            cmd_tx,
            subscribed: false,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    fn send(&self, cmd: SimCmd) -> Result<(), BoxError> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Box::new(HwError::Disconnected) as BoxError)
    }
}

impl EdgeSource for SimulatedTach {
    fn subscribe(&mut self, sink: EdgeSink) -> Result<(), BoxError> {
        if self.subscribed {
            return Err(Box::new(HwError::AlreadySubscribed));
        }
        self.send(SimCmd::Subscribe(sink))?;
        self.subscribed = true;
        Ok(())
    }

    fn arm_watchdog(&mut self, timeout_ms: u32) -> Result<(), BoxError> {
        let w = (timeout_ms > 0).then(|| Duration::from_millis(u64::from(timeout_ms)));
        self.send(SimCmd::Watchdog(w))
    }

    fn disarm_watchdog(&mut self) -> Result<(), BoxError> {
        self.send(SimCmd::Watchdog(None))
    }

    fn unsubscribe(&mut self) -> Result<(), BoxError> {
        self.send(SimCmd::Unsubscribe)?;
        self.subscribed = false;
        Ok(())
    }
}

impl Drop for SimulatedTach {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("sim tach thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "sim tach thread panicked during shutdown");
                }
            }
        }
    }
}
