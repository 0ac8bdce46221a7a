//! The repeating wake signal.

use crate::signal::{Signal, SignalEmitter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Emits `Signal::Wake`, waits `interval`, and repeats until stopped.
///
/// The loop runs on its own tokio task so the caller can block on user
/// input meanwhile. It is paced by a tokio interval rather than the session
/// clock: the signal is for a person at the keyboard, so it keeps real time
/// even when the session itself runs on virtual time.
///
/// The stop flag is only checked between emissions, so an emission in
/// progress always completes. Dropping the loop without calling `stop` still
/// raises the flag.
pub struct SignalLoop {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: Option<JoinHandle<u64>>,
}

impl SignalLoop {
    /// Spawns the loop on the current tokio runtime. The first signal is
    /// emitted immediately.
    pub fn start(emitter: Arc<dyn SignalEmitter>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let flag = stop.clone();
        let woken = wake.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut emitted: u64 = 0;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = woken.notified() => {}
                }
                if flag.load(Ordering::Acquire) {
                    break;
                }
                emitter.emit(Signal::Wake);
                emitted += 1;
            }
            emitted
        });
        debug!(?interval, "wake signal loop started");
        Self {
            stop,
            wake,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Raises the stop flag and waits for the loop to finish its current
    /// iteration. Returns how many wake signals were emitted.
    pub async fn stop(mut self) -> u64 {
        self.halt();
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.await {
            Ok(emitted) => {
                debug!(emitted, "wake signal loop stopped");
                emitted
            }
            Err(e) => {
                warn!(error = %e, "wake signal loop ended abnormally");
                0
            }
        }
    }

    fn halt(&self) {
        self.stop.store(true, Ordering::Release);
        // A stored permit, so a loop that is between ticks sees it too.
        self.wake.notify_one();
    }
}

impl Drop for SignalLoop {
    fn drop(&mut self) {
        self.halt();
    }
}
