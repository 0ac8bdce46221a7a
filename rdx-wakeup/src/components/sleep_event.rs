//! Defines sleep events: one-shot side effects due a fixed period before wake.

use crate::common::TriggerOffset;
use crate::config::{AccelerateConfig, AcclimateConfig};
use crate::error::Result;
use crate::signal::{Signal, SignalEmitter};
use crate::time::Clock;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// What a firing event may use: the session clock and the signal emitter.
pub struct FireContext<'a> {
    pub clock: &'a dyn Clock,
    pub emitter: &'a dyn SignalEmitter,
}

/// A timed side effect scheduled relative to the total wait.
///
/// Lifecycle: `set_sleep_length` once, then `time` any number of times, then
/// `fire` at most once. Calling `time` or `fire` before `set_sleep_length`
/// fails with `WakeError::PreconditionViolation`.
#[async_trait]
pub trait SleepEvent: Send + Sync {
    /// A short, stable name for logs.
    fn name(&self) -> &'static str;

    /// How long before wake this event is due.
    fn period(&self) -> Duration;

    /// Computes the trigger offset as `total - period`, clamped at zero.
    fn set_sleep_length(&mut self, total: Duration);

    /// Offset from session start at which the event is due. Zero means the
    /// period did not fit and firing is a no-op.
    fn time(&self) -> Result<Duration>;

    async fn fire(&mut self, ctx: &FireContext<'_>) -> Result<()>;
}

/// Soft cues in the last minutes before wake, spaced by a decaying pattern.
#[derive(Debug, Clone)]
pub struct AcclimateEvent {
    period: Duration,
    cues: u32,
    offset: TriggerOffset,
}

impl AcclimateEvent {
    pub const NAME: &'static str = "acclimate";
    const BASE_PITCH_HZ: f64 = 4000.0;

    pub fn new(period: Duration, cues: u32) -> Self {
        Self {
            period,
            cues,
            offset: TriggerOffset::unset(),
        }
    }

    pub fn from_config(config: &AcclimateConfig) -> Self {
        Self::new(Duration::from_secs(config.period_secs), config.cues)
    }

    /// Fraction of the period to wait after cue `i` (1-based).
    pub fn pattern(i: u32) -> f64 {
        0.5274 * f64::from(i).powf(-1.5214)
    }
}

impl Default for AcclimateEvent {
    fn default() -> Self {
        Self::from_config(&AcclimateConfig::default())
    }
}

#[async_trait]
impl SleepEvent for AcclimateEvent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn set_sleep_length(&mut self, total: Duration) {
        self.offset.arm(total, self.period);
    }

    fn time(&self) -> Result<Duration> {
        self.offset.get(Self::NAME)
    }

    async fn fire(&mut self, ctx: &FireContext<'_>) -> Result<()> {
        if self.time()?.is_zero() {
            debug!(event = Self::NAME, "period does not fit in the wait, skipping");
            return Ok(());
        }
        for i in 1..=self.cues {
            let fraction = Self::pattern(i);
            let pitch_hz = (Self::BASE_PITCH_HZ * fraction).round() as u32;
            ctx.emitter.emit(Signal::Cue { pitch_hz });
            debug!(event = Self::NAME, cue = i, pitch_hz, "cue");
            ctx.clock.sleep(self.period.mul_f64(fraction)).await;
        }
        Ok(())
    }
}

/// A burst of wake signals an hour (by default) before wake.
#[derive(Debug, Clone)]
pub struct AccelerateEvent {
    period: Duration,
    signals: u32,
    cadence: Duration,
    offset: TriggerOffset,
}

impl AccelerateEvent {
    pub const NAME: &'static str = "accelerate";

    pub fn new(period: Duration, signals: u32, cadence: Duration) -> Self {
        Self {
            period,
            signals,
            cadence,
            offset: TriggerOffset::unset(),
        }
    }

    pub fn from_config(config: &AccelerateConfig) -> Self {
        Self::new(
            Duration::from_secs(config.period_secs),
            config.signals,
            Duration::from_millis(config.cadence_ms),
        )
    }
}

impl Default for AccelerateEvent {
    fn default() -> Self {
        Self::from_config(&AccelerateConfig::default())
    }
}

#[async_trait]
impl SleepEvent for AccelerateEvent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn set_sleep_length(&mut self, total: Duration) {
        self.offset.arm(total, self.period);
    }

    fn time(&self) -> Result<Duration> {
        self.offset.get(Self::NAME)
    }

    async fn fire(&mut self, ctx: &FireContext<'_>) -> Result<()> {
        if self.time()?.is_zero() {
            debug!(event = Self::NAME, "period does not fit in the wait, skipping");
            return Ok(());
        }
        for n in 0..self.signals {
            ctx.emitter.emit(Signal::Wake);
            if n + 1 < self.signals {
                ctx.clock.sleep(self.cadence).await;
            }
        }
        debug!(event = Self::NAME, signals = self.signals, "burst done");
        Ok(())
    }
}
