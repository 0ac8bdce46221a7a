//! Sleep session records and the sinks they are written to.
//!
//! One line per completed session:
//!
//! ```text
//! 7.42#2026-03-02T06:30:00+01:00 18.3 6
//! ```
//!
//! hours slept `#` session start, seconds it took to shut the alarm off, and
//! the number of words in the passphrase.

use crate::error::{Result, WakeError};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// The record of one completed sleep session.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepLogEntry {
    /// Session start to wake signal, in hours.
    pub hours_slept: f64,
    pub started_at: DateTime<FixedOffset>,
    /// Wake signal to correct passphrase input.
    pub shutoff: Duration,
    pub passphrase_words: usize,
}

impl fmt::Display for SleepLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}#{} {:.1} {}",
            self.hours_slept,
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, false),
            self.shutoff.as_secs_f64(),
            self.passphrase_words
        )
    }
}

impl FromStr for SleepLogEntry {
    type Err = WakeError;

    fn from_str(line: &str) -> Result<Self> {
        let invalid = |reason: &str| WakeError::InvalidLogEntry {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let (hours, rest) = line.trim().split_once('#').ok_or_else(|| invalid("missing '#'"))?;
        let hours_slept: f64 = hours.parse().map_err(|_| invalid("bad hours slept"))?;

        let mut fields = rest.split_whitespace();
        let (Some(start), Some(shutoff), Some(words), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid("expected start, shutoff seconds and word count"));
        };

        let started_at =
            DateTime::parse_from_rfc3339(start).map_err(|_| invalid("bad start timestamp"))?;
        let shutoff: f64 = shutoff.parse().map_err(|_| invalid("bad shutoff seconds"))?;
        let shutoff =
            Duration::try_from_secs_f64(shutoff).map_err(|_| invalid("bad shutoff seconds"))?;
        let passphrase_words = words.parse().map_err(|_| invalid("bad word count"))?;

        Ok(Self {
            hours_slept,
            started_at,
            shutoff,
            passphrase_words,
        })
    }
}

/// Where completed sessions go. `record` is called once per completed
/// session and never for an abandoned one.
pub trait SessionSink: Send + Sync {
    fn record(&self, entry: &SleepLogEntry) -> Result<()>;
}

impl<T: SessionSink + ?Sized> SessionSink for Arc<T> {
    fn record(&self, entry: &SleepLogEntry) -> Result<()> {
        (**self).record(entry)
    }
}

/// Appends one line per session to a file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: std::io::Error) -> WakeError {
        WakeError::ResourceUnavailable {
            resource: "sleep log",
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionSink for FileSink {
    fn record(&self, entry: &SleepLogEntry) -> Result<()> {
        let line = format!("{entry}\n");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.unavailable(e))?;
        // One write of the whole line, so a record is either there or not.
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| self.unavailable(e))?;
        debug!(path = %self.path.display(), "sleep session recorded");
        Ok(())
    }
}

/// Keeps records in memory. Used by simulations and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SleepLogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SleepLogEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl SessionSink for MemorySink {
    fn record(&self, entry: &SleepLogEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }
}

/// Reads every well-formed record from a sleep log. A missing file is an
/// empty history; malformed lines are skipped with a warning.
pub fn read_log(path: &Path) -> Result<Vec<SleepLogEntry>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(WakeError::ResourceUnavailable {
                resource: "sleep log",
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut entries = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<SleepLogEntry>() {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line = number + 1, error = %e, "skipping sleep log line"),
        }
    }
    Ok(entries)
}

/// Mean hours slept across `entries`, if there are any.
pub fn mean_hours_slept(entries: &[SleepLogEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    let total: f64 = entries.iter().map(|e| e.hours_slept).sum();
    Some(total / entries.len() as f64)
}
