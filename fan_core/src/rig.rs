//! One tach reader and one PWM driver sharing a lifecycle.
use fan_traits::{EdgeSource, PwmOutput};

use crate::config::TachConfig;
use crate::error::Result;
use crate::pwm::PwmDriver;
use crate::tach::TachReader;

/// Fan under test: tach input plus PWM drive.
///
/// `stop()` drives the fan to 0% and releases the tach subscription and
/// watchdog. It runs on every exit path, explicitly or on drop.
#[derive(Debug)]
pub struct FanRig<E: EdgeSource, P: PwmOutput> {
    tach: TachReader<E>,
    pwm: PwmDriver<P>,
    stopped: bool,
}

impl<E: EdgeSource, P: PwmOutput> FanRig<E, P> {
    /// Start the tach reader on `source` and wrap `out` at `carrier_hz`.
    ///
    /// The PWM output is not touched until the first `set_duty`.
    pub fn open(source: E, out: P, tach_cfg: TachConfig, carrier_hz: u32) -> Result<Self> {
        let tach = TachReader::start(source, tach_cfg)?;
        Ok(Self {
            tach,
            pwm: PwmDriver::with_carrier(out, carrier_hz),
            stopped: false,
        })
    }

    pub fn tach(&self) -> &TachReader<E> {
        &self.tach
    }

    pub fn pwm(&self) -> &PwmDriver<P> {
        &self.pwm
    }

    pub fn set_duty(&mut self, pct: u8) -> Result<()> {
        self.pwm.set_duty(pct)
    }

    pub fn rpm(&self) -> f64 {
        self.tach.rpm()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the fan and release the tach line. Failures are logged, not returned.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(e) = self.pwm.stop() {
            tracing::warn!(error = %e, "failed to drive fan to 0%");
        }
        if let Err(e) = self.tach.release() {
            tracing::warn!(error = %e, "failed to release tach line");
        }
        tracing::debug!("fan rig stopped");
    }
}

impl<E: EdgeSource, P: PwmOutput> Drop for FanRig<E, P> {
    fn drop(&mut self) {
        self.stop();
    }
}
