//! Contains common, primitive types shared across the engine.
//!
//! `EventId` identifies a sleep event registered with the scheduler, and
//! `TriggerOffset` is the single piece of computed state every sleep event
//! carries: how long after the session start it is due.

use crate::error::{Result, WakeError};
use slotmap::new_key_type;
use std::time::Duration;

new_key_type! {
    /// Uniquely identifies a sleep event registered with an `EventScheduler`.
    ///
    /// Keys are never reused, so an id held after `remove` stays stale
    /// instead of silently pointing at a different event.
    pub struct EventId;
}

/// The computed trigger offset of a sleep event.
///
/// Starts unset. `arm` computes `total - period`, clamped at zero: an event
/// whose period does not fit inside the total wait gets a zero offset and is
/// treated as a no-op when fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerOffset(Option<Duration>);

impl TriggerOffset {
    pub const fn unset() -> Self {
        Self(None)
    }

    /// Computes the offset for a session of `total` length.
    pub fn arm(&mut self, total: Duration, period: Duration) {
        self.0 = Some(total.saturating_sub(period));
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }

    /// Returns the armed offset, or a precondition violation naming `event`.
    pub fn get(&self, event: &'static str) -> Result<Duration> {
        self.0.ok_or(WakeError::PreconditionViolation { event })
    }
}
