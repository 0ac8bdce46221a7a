//! Wake signal emitters.
//!
//! The engine never plays sound itself. It hands a `Signal` to whatever
//! `SignalEmitter` it was built with and moves on; how the signal is realized
//! (a sound file, the terminal bell, a notification) is the emitter's concern.

use std::io::Write;
use std::process::Stdio;
use std::sync::Mutex;
use tracing::{trace, warn};

/// A single signal handed to an emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// A soft acclimation cue. `pitch_hz` is a hint that emitters may ignore.
    Cue { pitch_hz: u32 },
    /// A full wake signal.
    Wake,
}

/// Realizes signals. `emit` must not block for long: it is called from the
/// scheduler and from the repeating signal task.
pub trait SignalEmitter: Send + Sync {
    fn emit(&self, signal: Signal);
}

/// Runs an external program (e.g. `paplay some.ogg`) once per signal.
///
/// The child is spawned and not waited on; tokio reaps it in the background.
/// Failures are logged and otherwise ignored so a broken player never stops
/// the session.
#[derive(Debug, Clone)]
pub struct CommandEmitter {
    program: String,
    args: Vec<String>,
}

impl CommandEmitter {
    /// Builds an emitter from `[program, args...]`. Returns `None` for an
    /// empty command.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl SignalEmitter for CommandEmitter {
    fn emit(&self, signal: Signal) {
        trace!(?signal, program = %self.program, "spawning signal command");
        let spawned = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = spawned {
            warn!(program = %self.program, error = %e, "failed to run signal command");
        }
    }
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl SignalEmitter for TerminalBell {
    fn emit(&self, _signal: Signal) {
        let mut stderr = std::io::stderr().lock();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            warn!(error = %e, "failed to ring terminal bell");
        }
    }
}

/// Keeps every emitted signal in memory. Used by simulations and tests.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    signals: Mutex<Vec<Signal>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, wanted: impl Fn(&Signal) -> bool) -> usize {
        self.signals().iter().filter(|s| wanted(s)).count()
    }
}

impl SignalEmitter for RecordingEmitter {
    fn emit(&self, signal: Signal) {
        self.signals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(signal);
    }
}
