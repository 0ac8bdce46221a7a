//! # Wakeup
//!
//! A passphrase-guarded alarm engine for Rust.
//!
//! Wakeup waits until a wake time, optionally plays pre-wake cues on the way,
//! then sounds a repeating wake signal that only stops once a randomly drawn
//! passphrase has been typed back exactly.
//!
//! ## Core Concepts
//!
//! - **Clock**: every wait goes through a `Clock`, either real time
//!   (`SystemClock`) or virtual time (`SimulatedClock`).
//! - **Sleep Events**: one-shot side effects due a fixed period before wake
//!   (`AcclimateEvent`, `AccelerateEvent`, or your own `SleepEvent`).
//! - **EventScheduler**: orders sleep events by trigger offset and fires
//!   them as time passes, then signals wake.
//! - **Alarm**: the session itself. Sleeps, wakes, runs the shutoff
//!   challenge and records the session.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use wakeup::prelude::*;
//! use chrono::{Local, Utc};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the configuration (file is optional).
//!     let config = WakeupConfig::load(None)?;
//!
//!     // 2. Resolve the wake target.
//!     let wake_at = next_occurrence("07:30", &Local::now())?.with_timezone(&Utc);
//!
//!     // 3. Build the alarm and pick its sleep events.
//!     let mut alarm = Alarm::new(wake_at, config);
//!     alarm.acclimate();
//!
//!     // 4. Watch progress.
//!     let mut events = alarm.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{:?}", event);
//!         }
//!     });
//!
//!     // 5. Sleep, wake, and wait for the passphrase.
//!     let outcome = alarm.run(Box::new(ScriptedPrompt::default().echoing())).await?;
//!     println!("{}", outcome.entry);
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Wakeup";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod alarm;
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod passphrase;
pub mod session_log;
pub mod signal;
pub mod time;

/// A prelude module for easy importing of the most common Wakeup types.
pub mod prelude {
    pub use crate::alarm::{Alarm, ScriptedPrompt, SessionOutcome, ShutoffPrompt};
    pub use crate::common::EventId;
    pub use crate::components::sleep_event::{AccelerateEvent, AcclimateEvent, SleepEvent};
    pub use crate::config::WakeupConfig;
    pub use crate::engine::EventScheduler;
    pub use crate::error::{Result, WakeError};
    pub use crate::events::{AlarmEvent, AlarmState};
    pub use crate::passphrase::{Passphrase, WordSource};
    pub use crate::session_log::{SessionSink, SleepLogEntry};
    pub use crate::signal::{Signal, SignalEmitter};
    pub use crate::time::{next_occurrence, Clock, SimulatedClock, SystemClock};
}
