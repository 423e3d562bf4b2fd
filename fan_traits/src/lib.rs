pub mod clock;

pub use clock::{Clock, MonotonicClock, ScaledClock};

/// Error type crossing the GPIO trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Full-scale value of the native PWM duty range (1_000_000 = 100%).
pub const PWM_DUTY_RANGE: u32 = 1_000_000;

/// What the tach line reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Rising transition on the input line.
    Rising,
    /// No edge arrived within the armed watchdog window.
    WatchdogTimeout,
}

/// One notification from an edge source.
///
/// `tick` is a free-running microsecond counter that wraps at `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub tick: u32,
    pub kind: EdgeKind,
}

impl EdgeEvent {
    pub const fn rising(tick: u32) -> Self {
        Self {
            tick,
            kind: EdgeKind::Rising,
        }
    }

    pub const fn timeout(tick: u32) -> Self {
        Self {
            tick,
            kind: EdgeKind::WatchdogTimeout,
        }
    }
}

/// Callback invoked from the source's notification context.
///
/// Must return quickly and never block on the control loop.
pub type EdgeSink = Box<dyn FnMut(EdgeEvent) + Send>;

/// Digital input line delivering rising edges and watchdog timeouts.
///
/// Line mode (input, pull) is configured when the backend is constructed.
pub trait EdgeSource {
    /// Register the single consumer of edge notifications.
    fn subscribe(&mut self, sink: EdgeSink) -> Result<(), BoxError>;
    /// Arm the watchdog; a timeout event is synthesised whenever no edge
    /// arrives within `timeout_ms`.
    fn arm_watchdog(&mut self, timeout_ms: u32) -> Result<(), BoxError>;
    fn disarm_watchdog(&mut self) -> Result<(), BoxError>;
    /// Drop the registered sink; no notifications are delivered afterwards.
    fn unsubscribe(&mut self) -> Result<(), BoxError>;
}

/// Fixed-frequency hardware PWM output.
pub trait PwmOutput {
    /// Apply `duty` (0..=PWM_DUTY_RANGE) at `frequency_hz`.
    fn set_pwm(&mut self, frequency_hz: u32, duty: u32) -> Result<(), BoxError>;
}

impl<T: EdgeSource + ?Sized> EdgeSource for Box<T> {
    fn subscribe(&mut self, sink: EdgeSink) -> Result<(), BoxError> {
        (**self).subscribe(sink)
    }
    fn arm_watchdog(&mut self, timeout_ms: u32) -> Result<(), BoxError> {
        (**self).arm_watchdog(timeout_ms)
    }
    fn disarm_watchdog(&mut self) -> Result<(), BoxError> {
        (**self).disarm_watchdog()
    }
    fn unsubscribe(&mut self) -> Result<(), BoxError> {
        (**self).unsubscribe()
    }
}

impl<T: PwmOutput + ?Sized> PwmOutput for Box<T> {
    fn set_pwm(&mut self, frequency_hz: u32, duty: u32) -> Result<(), BoxError> {
        (**self).set_pwm(frequency_hz, duty)
    }
}
