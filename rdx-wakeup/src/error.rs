//! The error taxonomy shared by every part of the wakeup engine.

use crate::events::AlarmState;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing, running or shutting off an alarm.
#[derive(Error, Debug)]
pub enum WakeError {
    /// Invalid wake time, empty word source, bad event configuration.
    /// Always reported before any sleeping begins.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A sleep event was queried or fired before its sleep length was set.
    #[error("sleep event '{event}' used before set_sleep_length was called")]
    PreconditionViolation { event: &'static str },

    /// An alarm operation was called out of order.
    #[error("alarm is {actual}, expected {expected}")]
    InvalidState {
        expected: AlarmState,
        actual: AlarmState,
    },

    /// The typed shutoff input did not match the passphrase.
    #[error("shutoff input does not match the passphrase")]
    ShutoffMismatch,

    /// A file the engine depends on could not be opened or written.
    #[error("{resource} unavailable at {}: {source}", path.display())]
    ResourceUnavailable {
        resource: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sleep log line could not be parsed.
    #[error("invalid sleep log entry '{line}': {reason}")]
    InvalidLogEntry { line: String, reason: String },

    /// The shutoff challenge was cut short (input closed, prompt failed).
    /// The wake signal keeps sounding.
    #[error("session interrupted: {0}")]
    Interrupted(String),
}

impl From<config::ConfigError> for WakeError {
    fn from(err: config::ConfigError) -> Self {
        WakeError::Configuration(err.to_string())
    }
}

pub type Result<T, E = WakeError> = std::result::Result<T, E>;
