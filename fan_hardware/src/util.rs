use std::time::Instant;

/// Microsecond tick for `at`, counted from `epoch` and offset by `origin`.
///
/// The counter is 32 bits wide and wraps roughly every 71.6 minutes, the same
/// width the GPIO daemon timestamps carry.
#[inline]
pub fn micros_tick(epoch: Instant, origin: u32, at: Instant) -> u32 {
    let us = at.saturating_duration_since(epoch).as_micros();
    // Truncation is the wrap.
    origin.wrapping_add(us as u32)
}
