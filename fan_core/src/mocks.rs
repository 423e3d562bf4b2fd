//! Test and helper mocks for fan_core

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fan_traits::{BoxError, EdgeEvent, EdgeSink, EdgeSource, PwmOutput};

use crate::error::Result;
use crate::record::{RecordSink, RunRecord, SampleRecord};

/// Every call made against a `SpyGpio`, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioCall {
    Subscribe,
    ArmWatchdog(u32),
    DisarmWatchdog,
    Unsubscribe,
    SetPwm { frequency_hz: u32, duty: u32 },
}

#[derive(Default)]
struct SpyState {
    calls: Vec<GpioCall>,
    sink: Option<EdgeSink>,
    watchdog_ms: Option<u32>,
    duty: Option<u32>,
    fail_subscribe: bool,
    fail_arm: bool,
    fail_set_pwm: bool,
}

/// Recording GPIO backend standing in for both the tach line and the PWM.
///
/// Clones share state, so one handle can be given to a rig while the test
/// keeps another to inject edges and inspect calls.
#[derive(Clone, Default)]
pub struct SpyGpio {
    state: Arc<Mutex<SpyState>>,
}

impl core::fmt::Debug for SpyGpio {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = self.lock();
        f.debug_struct("SpyGpio")
            .field("calls", &s.calls)
            .field("subscribed", &s.sink.is_some())
            .field("watchdog_ms", &s.watchdog_ms)
            .field("duty", &s.duty)
            .finish()
    }
}

impl SpyGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spy whose `subscribe` fails.
    pub fn failing_subscribe() -> Self {
        let spy = Self::new();
        spy.lock().fail_subscribe = true;
        spy
    }

    /// Spy whose `arm_watchdog` fails.
    pub fn failing_watchdog() -> Self {
        let spy = Self::new();
        spy.lock().fail_arm = true;
        spy
    }

    /// Spy whose `set_pwm` fails.
    pub fn failing_pwm() -> Self {
        let spy = Self::new();
        spy.lock().fail_set_pwm = true;
        spy
    }

    fn lock(&self) -> MutexGuard<'_, SpyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `ev` to the current subscriber. Returns false if none.
    pub fn emit(&self, ev: EdgeEvent) -> bool {
        let mut s = self.lock();
        match s.sink.as_mut() {
            Some(sink) => {
                sink(ev);
                true
            }
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<GpioCall> {
        self.lock().calls.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().sink.is_some()
    }

    /// Armed watchdog window, if any.
    pub fn watchdog_ms(&self) -> Option<u32> {
        self.lock().watchdog_ms
    }

    /// Last native duty applied.
    pub fn last_duty(&self) -> Option<u32> {
        self.lock().duty
    }
}

fn spy_error(what: &str) -> BoxError {
    Box::new(std::io::Error::other(format!("spy {what} failure")))
}

impl EdgeSource for SpyGpio {
    fn subscribe(&mut self, sink: EdgeSink) -> std::result::Result<(), BoxError> {
        let mut s = self.lock();
        s.calls.push(GpioCall::Subscribe);
        if s.fail_subscribe {
            return Err(spy_error("subscribe"));
        }
        s.sink = Some(sink);
        Ok(())
    }

    fn arm_watchdog(&mut self, timeout_ms: u32) -> std::result::Result<(), BoxError> {
        let mut s = self.lock();
        s.calls.push(GpioCall::ArmWatchdog(timeout_ms));
        if s.fail_arm {
            return Err(spy_error("watchdog"));
        }
        s.watchdog_ms = Some(timeout_ms);
        Ok(())
    }

    fn disarm_watchdog(&mut self) -> std::result::Result<(), BoxError> {
        let mut s = self.lock();
        s.calls.push(GpioCall::DisarmWatchdog);
        s.watchdog_ms = None;
        Ok(())
    }

    fn unsubscribe(&mut self) -> std::result::Result<(), BoxError> {
        let mut s = self.lock();
        s.calls.push(GpioCall::Unsubscribe);
        s.sink = None;
        Ok(())
    }
}

impl PwmOutput for SpyGpio {
    fn set_pwm(&mut self, frequency_hz: u32, duty: u32) -> std::result::Result<(), BoxError> {
        let mut s = self.lock();
        s.calls.push(GpioCall::SetPwm { frequency_hz, duty });
        if s.fail_set_pwm {
            return Err(spy_error("pwm"));
        }
        s.duty = Some(duty);
        Ok(())
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    pub samples: Vec<SampleRecord>,
    pub runs: Vec<RunRecord>,
}

impl RecordSink for VecSink {
    fn sample(&mut self, rec: &SampleRecord) -> Result<()> {
        self.samples.push(*rec);
        Ok(())
    }

    fn run(&mut self, rec: &RunRecord) -> Result<()> {
        self.runs.push(*rec);
        Ok(())
    }
}
