use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction for the sampling loop and backends.
///
/// - now(): returns a monotonic Instant
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - elapsed_since(): helper to compute elapsed time from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time elapsed since `epoch`, saturating at zero.
    fn elapsed_since(&self, epoch: Instant) -> Duration {
        self.now().saturating_duration_since(epoch)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, d: Duration) {
        (**self).sleep(d);
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Real clock running `factor` times faster than wall time.
///
/// Sleeps are shortened by `factor` and `now()` reports accelerated time, so
/// a multi-minute schedule can be exercised against live simulated hardware.
#[derive(Debug, Clone, Copy)]
pub struct ScaledClock {
    origin: Instant,
    factor: u32,
}

impl ScaledClock {
    pub fn new(factor: u32) -> Self {
        Self {
            origin: Instant::now(),
            factor: factor.max(1),
        }
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> Instant {
        let real = self.origin.elapsed();
        self.origin + real.saturating_mul(self.factor)
    }

    fn sleep(&self, d: Duration) {
        let real = d / self.factor;
        if !real.is_zero() {
            thread::sleep(real);
        }
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic test clock whose time can be advanced manually.
    ///
    /// now() = origin + offset
    /// sleep(d) advances internal time by d without actually sleeping.
    /// Registered hooks run after every advance, which lets tests fire
    /// events at chosen points of simulated time.
    #[derive(Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
        hooks: Arc<Mutex<Vec<Box<dyn FnMut(Duration) + Send>>>>,
    }

    impl std::fmt::Debug for TestClock {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TestClock")
                .field("offset", &self.offset())
                .finish()
        }
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
                hooks: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Current offset from the origin.
        pub fn offset(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            let now = if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
                *off
            } else {
                return;
            };
            if let Ok(mut hooks) = self.hooks.lock() {
                for hook in hooks.iter_mut() {
                    hook(now);
                }
            }
        }

        /// Set the absolute offset relative to origin (useful for tests).
        pub fn set_offset(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = d;
            }
        }

        /// Register a callback invoked with the new offset after every advance.
        pub fn on_advance(&self, hook: impl FnMut(Duration) + Send + 'static) {
            if let Ok(mut hooks) = self.hooks.lock() {
                hooks.push(Box::new(hook));
            }
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.offset()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }

}
