//! Common tick, rounding, and sleep helpers for fan_core.

use fan_traits::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Number of microseconds in one minute.
pub const MICROS_PER_MIN: f64 = 60_000_000.0;
/// Number of microseconds in one millisecond.
pub const MICROS_PER_MILLI: f64 = 1_000.0;

/// Ticks elapsed from `old` to `new` on a wrapping 32-bit counter.
///
/// Correct across one wrap of the counter; never use signed subtraction here.
#[inline]
pub fn wrap_diff(old: u32, new: u32) -> u32 {
    new.wrapping_sub(old)
}

/// Round to the nearest half unit (1499.3 -> 1499.5, 1499.2 -> 1499.0).
#[inline]
pub fn round_half(x: f64) -> f64 {
    (x * 2.0).round() / 2.0
}

/// Sleep for `total` in slices of at most `slice`, checking `cancel` before
/// every slice. Returns `false` as soon as cancellation is observed.
pub fn sleep_unless_cancelled<C: Clock + ?Sized>(
    clock: &C,
    total: Duration,
    slice: Duration,
    cancel: &AtomicBool,
) -> bool {
    let slice = slice.max(Duration::from_millis(1));
    let deadline = clock.now() + total;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }
        let now = clock.now();
        if now >= deadline {
            return true;
        }
        clock.sleep((deadline - now).min(slice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fan_traits::clock::test_clock::TestClock;

    #[test]
    fn wrap_diff_handles_counter_wrap() {
        assert_eq!(wrap_diff(100, 250), 150);
        assert_eq!(wrap_diff(u32::MAX - 9, 10), 20);
        assert_eq!(wrap_diff(u32::MAX, 0), 1);
        assert_eq!(wrap_diff(7, 7), 0);
    }

    #[test]
    fn round_half_snaps_to_half_units() {
        assert_eq!(round_half(0.0), 0.0);
        assert_eq!(round_half(1499.2), 1499.0);
        assert_eq!(round_half(1499.3), 1499.5);
        assert_eq!(round_half(1499.8), 1500.0);
        assert_eq!(round_half(600.0), 600.0);
    }

    #[test]
    fn sleep_runs_to_completion_in_slices() {
        let clock = TestClock::new();
        let cancel = AtomicBool::new(false);
        let t0 = clock.now();
        assert!(sleep_unless_cancelled(
            &clock,
            Duration::from_millis(1050),
            Duration::from_millis(100),
            &cancel
        ));
        assert_eq!(clock.elapsed_since(t0), Duration::from_millis(1050));
    }

    #[test]
    fn sleep_stops_at_next_slice_after_cancel() {
        let clock = TestClock::new();
        let cancel = std::sync::Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        clock.on_advance(move |off| {
            if off >= Duration::from_millis(300) {
                flag.store(true, Ordering::Relaxed);
            }
        });
        let t0 = clock.now();
        assert!(!sleep_unless_cancelled(
            &clock,
            Duration::from_secs(10),
            Duration::from_millis(100),
            &cancel
        ));
        assert_eq!(clock.elapsed_since(t0), Duration::from_millis(300));
    }
}
