//! Tach period estimator.
//!
//! Rising edges on the tach line are turned into an exponentially smoothed
//! pulse period. Watchdog timeouts (no edge within the armed window) inflate
//! the period so a stalling rotor reads as a smoothly decaying RPM instead of
//! dropping straight to zero. Inflation stops at `PERIOD_CAP_US`; from there
//! the estimate stays frozen until the next edge.
//!
//! The estimate is shared between the source's notification context (writer)
//! and the control loop (reader) behind a mutex, so a reader never sees a
//! period from one update paired with a tick from another.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use eyre::WrapErr;
use fan_traits::{EdgeEvent, EdgeKind, EdgeSource};

use crate::config::{PERIOD_CAP_US, TachConfig};
use crate::error::Result;
use crate::hw_error::report;
use crate::util::{MICROS_PER_MILLI, MICROS_PER_MIN, wrap_diff};

/// Where the estimator is in its life.
///
/// `Bootstrapped` holds the first measured period (two edges seen) without
/// smoothing; every later edge moves to `Smoothed`, including recovery from
/// `Stalling`/`Saturated`, which resumes from the inflated base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TachState {
    #[default]
    NoSignal,
    Bootstrapped,
    Smoothed,
    /// Watchdog timeouts are inflating the period.
    Stalling,
    /// Period reached the cap; frozen until the next edge.
    Saturated,
}

/// Smoothed pulse period plus the tick of the last rising edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeriodEstimate {
    smoothed_period_us: Option<f64>,
    last_tick: Option<u32>,
    state: TachState,
}

impl PeriodEstimate {
    pub fn smoothed_period_us(&self) -> Option<f64> {
        self.smoothed_period_us
    }

    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    pub fn state(&self) -> TachState {
        self.state
    }

    /// Fold one notification into the estimate. O(1), no allocation.
    pub fn on_event(&mut self, ev: EdgeEvent, cfg: &TachConfig) {
        match ev.kind {
            EdgeKind::Rising => self.on_rising(ev.tick, cfg),
            EdgeKind::WatchdogTimeout => self.on_timeout(cfg),
        }
    }

    fn on_rising(&mut self, tick: u32, cfg: &TachConfig) {
        if let Some(last) = self.last_tick {
            let diff = f64::from(wrap_diff(last, tick));
            // Two edges on one tick carry no period information.
            if diff > 0.0 {
                match self.smoothed_period_us {
                    None => {
                        self.smoothed_period_us = Some(diff);
                        self.state = TachState::Bootstrapped;
                    }
                    Some(prev) => {
                        self.smoothed_period_us =
                            Some(cfg.weighting() * prev + cfg.new_weight() * diff);
                        self.state = TachState::Smoothed;
                    }
                }
            }
        }
        self.last_tick = Some(tick);
    }

    fn on_timeout(&mut self, cfg: &TachConfig) {
        let Some(period) = self.smoothed_period_us else {
            return;
        };
        if period < PERIOD_CAP_US {
            let inflated = period + f64::from(cfg.watchdog_timeout_ms()) * MICROS_PER_MILLI;
            self.smoothed_period_us = Some(inflated);
            self.state = if inflated >= PERIOD_CAP_US {
                TachState::Saturated
            } else {
                TachState::Stalling
            };
        } else {
            self.state = TachState::Saturated;
        }
    }

    /// RPM implied by the estimate; 0 with no estimate or below `min_rpm`.
    pub fn rpm(&self, cfg: &TachConfig) -> f64 {
        let Some(period) = self.smoothed_period_us else {
            return 0.0;
        };
        let rpm = MICROS_PER_MIN / (period * cfg.pulses_per_rev());
        if !rpm.is_finite() || rpm < cfg.min_rpm() {
            0.0
        } else {
            rpm
        }
    }
}

#[inline]
fn lock(estimate: &Mutex<PeriodEstimate>) -> MutexGuard<'_, PeriodEstimate> {
    // The guarded value is plain data; a panicked writer cannot leave it torn.
    estimate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the tach line subscription and the shared period estimate.
pub struct TachReader<E: EdgeSource> {
    source: E,
    cfg: TachConfig,
    estimate: Arc<Mutex<PeriodEstimate>>,
    active: bool,
}

impl<E: EdgeSource> core::fmt::Debug for TachReader<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TachReader")
            .field("cfg", &self.cfg)
            .field("estimate", &self.estimate())
            .field("active", &self.active)
            .finish()
    }
}

impl<E: EdgeSource> TachReader<E> {
    /// Subscribe to rising edges on `source` and arm its watchdog.
    ///
    /// Failure to acquire either is fatal and returned to the caller.
    pub fn start(mut source: E, cfg: TachConfig) -> Result<Self> {
        let estimate = Arc::new(Mutex::new(PeriodEstimate::default()));
        let shared = estimate.clone();
        source
            .subscribe(Box::new(move |ev| lock(&shared).on_event(ev, &cfg)))
            .map_err(|e| report(&e))
            .wrap_err("tach subscribe")?;
        if let Err(e) = source.arm_watchdog(cfg.watchdog_timeout_ms()) {
            if let Err(unsub) = source.unsubscribe() {
                tracing::warn!(error = %unsub, "unsubscribe failed after watchdog error");
            }
            return Err(report(&e)).wrap_err("arm tach watchdog");
        }
        tracing::debug!(
            pulses_per_rev = cfg.pulses_per_rev(),
            weighting = cfg.weighting(),
            min_rpm = cfg.min_rpm(),
            watchdog_ms = cfg.watchdog_timeout_ms(),
            "tach reader started"
        );
        Ok(Self {
            source,
            cfg,
            estimate,
            active: true,
        })
    }

    /// Apply a notification directly, as the subscribed sink does.
    pub fn on_event(&self, ev: EdgeEvent) {
        lock(&self.estimate).on_event(ev, &self.cfg);
    }

    /// Current speed estimate in revolutions per minute.
    pub fn rpm(&self) -> f64 {
        lock(&self.estimate).rpm(&self.cfg)
    }

    /// Snapshot of the period estimate.
    pub fn estimate(&self) -> PeriodEstimate {
        *lock(&self.estimate)
    }

    pub fn state(&self) -> TachState {
        lock(&self.estimate).state
    }

    pub fn config(&self) -> &TachConfig {
        &self.cfg
    }

    /// Whether the subscription and watchdog are still held.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Disarm the watchdog and drop the edge subscription.
    ///
    /// Both releases are attempted even if the first fails; neither is
    /// retried. Calling this again after success is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let disarm = self.source.disarm_watchdog();
        let unsub = self.source.unsubscribe();
        disarm
            .map_err(|e| report(&e))
            .wrap_err("disarm tach watchdog")?;
        unsub.map_err(|e| report(&e)).wrap_err("tach unsubscribe")?;
        tracing::debug!("tach reader released");
        Ok(())
    }
}

impl<E: EdgeSource> Drop for TachReader<E> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "tach release failed on drop");
        }
    }
}
