//! Time sources for the engine.
//!
//! Everything that waits goes through the `Clock` trait, so a session can run
//! against real time (`SystemClock`) or against virtual time
//! (`SimulatedClock`) where every sleep completes instantly.

use crate::error::{Result, WakeError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// A source of monotonic time, wall time and blocking waits.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic instant used to measure elapsed time.
    fn now(&self) -> Instant;

    /// Wall-clock time used for wake targets and log timestamps.
    fn wall_now(&self) -> DateTime<Utc>;

    /// Waits for `duration`. Runs to completion once started.
    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual time. `sleep` advances the clock by the requested duration and
/// returns immediately; every requested sleep is recorded.
#[derive(Debug)]
pub struct SimulatedClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    state: Mutex<SimulatedState>,
}

#[derive(Debug, Default)]
struct SimulatedState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl SimulatedClock {
    /// Creates a clock whose wall time starts at `wall_origin`.
    pub fn starting_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            state: Mutex::new(SimulatedState::default()),
        }
    }

    /// Total virtual time that has passed.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Moves time forward without recording a sleep, e.g. to model work
    /// that takes real time.
    pub fn advance(&self, duration: Duration) {
        self.lock().elapsed += duration;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimulatedState> {
        // A poisoned lock only means a test panicked mid-update; the
        // durations inside are still meaningful.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    fn wall_now(&self) -> DateTime<Utc> {
        let elapsed = self.lock().elapsed;
        self.wall_origin + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::MAX)
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.lock();
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
        trace!(?duration, "simulated sleep");
        tokio::task::yield_now().await;
    }
}

/// Resolves an `HH:MM` wake time to its next occurrence after `now`.
///
/// The full timestamp is compared: a target at or before `now` moves to the
/// next day. A local time skipped by a DST gap resolves to the instant it
/// would have had before the clocks moved (02:30 on a night that jumps from
/// 02:00 to 03:00 rings at 03:30), so the alarm never slips a whole day.
pub fn next_occurrence<Tz: TimeZone>(hhmm: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    let time = NaiveTime::parse_from_str(hhmm.trim(), "%H:%M").map_err(|_| {
        WakeError::Configuration(format!("invalid wake time '{hhmm}', expected HH:MM"))
    })?;
    let tz = now.timezone();
    let mut date = now.date_naive();
    for _ in 0..2 {
        let local = date.and_time(time);
        let past_gap = local + chrono::Duration::hours(1);
        let target = tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| tz.from_local_datetime(&past_gap).earliest());
        if let Some(target) = target {
            if target > *now {
                return Ok(target);
            }
        }
        date = date.succ_opt().ok_or_else(|| {
            WakeError::Configuration("wake time is out of the calendar range".to_string())
        })?;
    }
    Err(WakeError::Configuration(format!(
        "wake time '{hhmm}' does not occur in the next day"
    )))
}
