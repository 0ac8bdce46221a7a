//! Defines all public event types broadcast while an alarm session runs.
//!
//! Front ends subscribe to these to show progress; the engine never depends
//! on anyone listening.

use crate::common::EventId;
use crate::session_log::SleepLogEntry;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// The lifecycle of an `Alarm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Sleeping,
    Waking,
    AwaitingShutoff,
    Stopped,
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlarmState::Idle => "idle",
            AlarmState::Sleeping => "sleeping",
            AlarmState::Waking => "waking",
            AlarmState::AwaitingShutoff => "awaiting shutoff",
            AlarmState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Progress notifications from a running session.
#[derive(Debug, Clone)]
pub enum AlarmEvent {
    /// Fired once when the alarm goes to sleep.
    SessionStarted {
        started_at: DateTime<Utc>,
        wake_at: DateTime<Utc>,
        wait: Duration,
        message: Option<String>,
    },
    /// Fired on every state transition.
    StateChanged { from: AlarmState, to: AlarmState },
    /// A sleep event was due and has been fired.
    EventFired { id: EventId, name: &'static str, offset: Duration },
    /// A sleep event was due but its period did not fit in the wait.
    EventSkipped { id: EventId, name: &'static str },
    /// The repeating wake signal has started.
    WakeSignalStarted,
    /// A shutoff attempt did not match the passphrase.
    ShutoffRejected { attempt: u32 },
    /// The session finished and its record was produced.
    SessionCompleted { entry: SleepLogEntry },
}
