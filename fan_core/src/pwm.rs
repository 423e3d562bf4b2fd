//! Percent duty to native PWM duty, and the fan drive wrapper.
use eyre::WrapErr;
use fan_traits::{PWM_DUTY_RANGE, PwmOutput};

use crate::config::PWM_CARRIER_HZ;
use crate::error::Result;
use crate::hw_error::report;

/// Native duty units per percent.
const NATIVE_PER_PCT: u32 = PWM_DUTY_RANGE / 100;

/// Map a duty percentage to the native duty range (`pct * 10_000`).
///
/// Values above 100 saturate at full scale.
#[inline]
pub fn duty_to_native(pct: u8) -> u32 {
    u32::from(pct.min(100)) * NATIVE_PER_PCT
}

/// Fan drive at a fixed carrier frequency.
#[derive(Debug)]
pub struct PwmDriver<P: PwmOutput> {
    out: P,
    carrier_hz: u32,
    duty_pct: Option<u8>,
}

impl<P: PwmOutput> PwmDriver<P> {
    pub fn new(out: P) -> Self {
        Self::with_carrier(out, PWM_CARRIER_HZ)
    }

    pub fn with_carrier(out: P, carrier_hz: u32) -> Self {
        Self {
            out,
            carrier_hz,
            duty_pct: None,
        }
    }

    pub fn carrier_hz(&self) -> u32 {
        self.carrier_hz
    }

    /// Last duty successfully applied, if any.
    pub fn duty_percent(&self) -> Option<u8> {
        self.duty_pct
    }

    pub fn set_duty(&mut self, pct: u8) -> Result<()> {
        let native = duty_to_native(pct);
        self.out
            .set_pwm(self.carrier_hz, native)
            .map_err(|e| report(&e))
            .wrap_err_with(|| format!("set pwm duty {pct}%"))?;
        self.duty_pct = Some(pct);
        tracing::debug!(duty_pct = pct, native, carrier_hz = self.carrier_hz, "pwm duty applied");
        Ok(())
    }

    /// Drive the output to 0% duty.
    pub fn stop(&mut self) -> Result<()> {
        self.set_duty(0)
    }
}
