//! Defines all configuration structures for the wakeup engine.
//!
//! These structs are designed to be deserialized from a TOML file using
//! `serde` and the `config` crate, layered under `WAKEUP__*` environment
//! variables. Every field has a default, so an empty (or missing) file is a
//! valid configuration.

use crate::error::{Result, WakeError};
use chrono_tz::Tz;
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The top-level configuration for an alarm session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WakeupConfig {
    /// Newline-delimited word list the shutoff passphrase is drawn from.
    pub word_source: PathBuf,

    /// Where completed sessions are appended.
    pub log_path: PathBuf,

    /// Time zone used to interpret `HH:MM` wake times. System local time
    /// when unset. Uses IANA names (e.g. "Europe/Berlin").
    pub timezone: Option<Tz>,

    pub passphrase: PassphraseConfig,
    pub signal: SignalConfig,
    pub acclimate: AcclimateConfig,
    pub accelerate: AccelerateConfig,
    pub messages: MessageConfig,
}

/// Bounds for the number of words in a shutoff passphrase (inclusive).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PassphraseConfig {
    pub min_words: usize,
    pub max_words: usize,
}

/// How the repeating wake signal is produced.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Pause between two wake signals.
    pub interval_ms: u64,
    /// External player invoked once per signal. Empty means terminal bell.
    pub command: Vec<String>,
}

/// Soft cues in the last minutes before wake.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AcclimateConfig {
    pub period_secs: u64,
    pub cues: u32,
}

/// A burst of wake signals well ahead of wake time.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AccelerateConfig {
    pub period_secs: u64,
    pub signals: u32,
    pub cadence_ms: u64,
}

/// User-facing text.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    /// One of these is shown when the session starts.
    pub sleep: Vec<String>,
    pub incorrect: String,
    pub shutoff: String,
}

impl WakeupConfig {
    /// Loads the configuration from an optional TOML file, then applies
    /// `WAKEUP__SECTION__KEY` environment overrides, then validates.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        let config: WakeupConfig = builder
            .add_source(
                Environment::with_prefix("WAKEUP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a working session.
    pub fn validate(&self) -> Result<()> {
        let PassphraseConfig { min_words, max_words } = self.passphrase;
        if min_words == 0 {
            return Err(WakeError::Configuration(
                "passphrase.min_words must be at least 1".to_string(),
            ));
        }
        if min_words > max_words {
            return Err(WakeError::Configuration(format!(
                "passphrase.min_words ({min_words}) exceeds passphrase.max_words ({max_words})"
            )));
        }
        if self.signal.interval_ms == 0 {
            return Err(WakeError::Configuration(
                "signal.interval_ms must be positive".to_string(),
            ));
        }
        if self.acclimate.period_secs == 0 || self.acclimate.cues == 0 {
            return Err(WakeError::Configuration(
                "acclimate.period_secs and acclimate.cues must be positive".to_string(),
            ));
        }
        if self.accelerate.period_secs == 0 || self.accelerate.signals == 0 {
            return Err(WakeError::Configuration(
                "accelerate.period_secs and accelerate.signals must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn signal_interval(&self) -> Duration {
        Duration::from_millis(self.signal.interval_ms)
    }
}

// --- Defaults ---

impl Default for WakeupConfig {
    fn default() -> Self {
        Self {
            word_source: PathBuf::from("/usr/share/dict/words"),
            log_path: PathBuf::from("./.sleeplog"),
            timezone: None,
            passphrase: PassphraseConfig::default(),
            signal: SignalConfig::default(),
            acclimate: AcclimateConfig::default(),
            accelerate: AccelerateConfig::default(),
            messages: MessageConfig::default(),
        }
    }
}

impl Default for PassphraseConfig {
    fn default() -> Self {
        Self {
            min_words: 4,
            max_words: 8,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            command: Vec::new(),
        }
    }
}

impl Default for AcclimateConfig {
    fn default() -> Self {
        Self {
            period_secs: 5 * 60,
            cues: 5,
        }
    }
}

impl Default for AccelerateConfig {
    fn default() -> Self {
        Self {
            period_secs: 60 * 60,
            signals: 6,
            cadence_ms: 1000,
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            sleep: vec!["Sweet Dreams".to_string(), "Goodnight".to_string()],
            incorrect: "incorrect input".to_string(),
            shutoff: "Enter the following to terminate alarm:".to_string(),
        }
    }
}
