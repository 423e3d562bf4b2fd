//! Raspberry Pi backend: tach input via GPIO interrupts, fan drive via the
//! BCM hardware PWM block.
use fan_traits::{BoxError, EdgeEvent, EdgeSink, EdgeSource, PWM_DUTY_RANGE, PwmOutput};
use rppal::gpio::{Gpio, InputPin, Trigger};
use rppal::pwm::{Channel, Polarity, Pwm};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::micros_tick;

/// Poll slice used while the watchdog is disarmed, so shutdown stays prompt.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Tach input line. Rising edges are waited for on a dedicated thread that
/// owns the pin while subscribed; the pin is handed back on unsubscribe.
pub struct GpioTach {
    line: u8,
    pin: Option<InputPin>,
    watchdog_ms: Arc<AtomicU32>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<InputPin>>,
}

impl GpioTach {
    pub fn new(line: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))?;
        let mut pin = gpio
            .get(line)
            .map_err(|e| HwError::Gpio(format!("open tach pin {line}: {e}")))?
            .into_input();
        pin.set_interrupt(Trigger::RisingEdge)
            .map_err(|e| HwError::Gpio(format!("tach pin {line} interrupt: {e}")))?;
        Ok(Self {
            line,
            pin: Some(pin),
            watchdog_ms: Arc::new(AtomicU32::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            join_handle: None,
        })
    }

    fn stop_thread(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            let pin = handle.join().map_err(|_| HwError::Disconnected)?;
            self.pin = Some(pin);
        }
        Ok(())
    }
}

impl EdgeSource for GpioTach {
    fn subscribe(&mut self, mut sink: EdgeSink) -> std::result::Result<(), BoxError> {
        let Some(mut pin) = self.pin.take() else {
            return Err(Box::new(HwError::AlreadySubscribed));
        };
        self.shutdown.store(false, Ordering::Relaxed);
        let shutdown = self.shutdown.clone();
        let watchdog_ms = self.watchdog_ms.clone();
        let line = self.line;

        self.join_handle = Some(std::thread::spawn(move || {
            let epoch = Instant::now();
            while !shutdown.load(Ordering::Relaxed) {
                let wd = watchdog_ms.load(Ordering::Relaxed);
                let timeout = if wd > 0 {
                    Duration::from_millis(u64::from(wd))
                } else {
                    IDLE_POLL
                };
                match pin.poll_interrupt(true, Some(timeout)) {
                    Ok(Some(_level)) => {
                        sink(EdgeEvent::rising(micros_tick(epoch, 0, Instant::now())));
                    }
                    Ok(None) if wd > 0 => {
                        sink(EdgeEvent::timeout(micros_tick(epoch, 0, Instant::now())));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(line, error = %e, "tach interrupt poll failed");
                        break;
                    }
                }
            }
            trace!(line, "tach thread exiting cleanly");
            pin
        }));
        Ok(())
    }

    fn arm_watchdog(&mut self, timeout_ms: u32) -> std::result::Result<(), BoxError> {
        self.watchdog_ms.store(timeout_ms, Ordering::Relaxed);
        Ok(())
    }

    fn disarm_watchdog(&mut self) -> std::result::Result<(), BoxError> {
        self.watchdog_ms.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn unsubscribe(&mut self) -> std::result::Result<(), BoxError> {
        self.stop_thread()?;
        Ok(())
    }
}

impl Drop for GpioTach {
    fn drop(&mut self) {
        if let Err(e) = self.stop_thread() {
            tracing::warn!(error = %e, "tach thread did not shut down cleanly");
        }
    }
}

/// Hardware PWM output. Only lines routed to the PWM block are accepted.
pub struct HardwarePwm {
    pwm: Pwm,
}

impl HardwarePwm {
    pub fn new(line: u8, frequency_hz: u32) -> Result<Self> {
        let channel = match line {
            12 | 18 => Channel::Pwm0,
            13 | 19 => Channel::Pwm1,
            other => {
                return Err(HwError::Pwm(format!(
                    "gpio {other} is not a hardware PWM line"
                )));
            }
        };
        let pwm = Pwm::with_frequency(
            channel,
            f64::from(frequency_hz),
            0.0,
            Polarity::Normal,
            true,
        )
        .map_err(|e| HwError::Pwm(format!("open pwm on gpio {line}: {e}")))?;
        Ok(Self { pwm })
    }
}

impl PwmOutput for HardwarePwm {
    fn set_pwm(&mut self, frequency_hz: u32, duty: u32) -> std::result::Result<(), BoxError> {
        let frac = f64::from(duty.min(PWM_DUTY_RANGE)) / f64::from(PWM_DUTY_RANGE);
        self.pwm
            .set_frequency(f64::from(frequency_hz), frac)
            .map_err(|e| Box::new(HwError::Pwm(e.to_string())) as BoxError)?;
        trace!(frequency_hz, duty, "hardware pwm set");
        Ok(())
    }
}

impl Drop for HardwarePwm {
    fn drop(&mut self) {
        if let Err(e) = self.pwm.disable() {
            tracing::warn!(error = %e, "pwm disable failed");
        }
    }
}
