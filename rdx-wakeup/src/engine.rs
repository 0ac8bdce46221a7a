//! The scheduler that orders sleep events and fires them as time passes.

use crate::common::EventId;
use crate::components::sleep_event::{FireContext, SleepEvent};
use crate::error::Result;
use crate::events::AlarmEvent;
use crate::signal::SignalEmitter;
use crate::time::Clock;
use slotmap::SlotMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// What a scheduler run did.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    /// Events in the order they were fired, with their trigger offsets.
    pub fired: Vec<(EventId, &'static str, Duration)>,
    /// Time from the start of the run to the wake signal.
    pub elapsed: Duration,
}

/// Holds the sleep events of one session and runs them to wake time.
///
/// Events are fired in ascending order of their trigger offset; events with
/// equal offsets keep the order they were added in.
pub struct EventScheduler {
    events: SlotMap<EventId, Box<dyn SleepEvent>>,
    order: Vec<EventId>,
    event_sender: Option<broadcast::Sender<AlarmEvent>>,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self {
            events: SlotMap::with_key(),
            order: Vec::new(),
            event_sender: None,
        }
    }

    /// Creates a scheduler that reports fired and skipped events on `sender`.
    pub fn with_event_sender(sender: broadcast::Sender<AlarmEvent>) -> Self {
        Self {
            event_sender: Some(sender),
            ..Self::new()
        }
    }

    /// Registers an event. Returns the id it can later be removed with.
    pub fn add(&mut self, event: Box<dyn SleepEvent>) -> EventId {
        let name = event.name();
        let id = self.events.insert(event);
        self.order.push(id);
        debug!(?id, name, "sleep event added");
        id
    }

    /// Returns `true` if the event was found and removed.
    pub fn remove(&mut self, id: EventId) -> bool {
        let removed = self.events.remove(id).is_some();
        if removed {
            self.order.retain(|&other| other != id);
        }
        removed
    }

    pub fn get(&self, id: EventId) -> Option<&dyn SleepEvent> {
        self.events.get(id).map(|event| event.as_ref())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Runs every event against a wait of `total_wait`, then calls `on_wake`.
    ///
    /// Each event is fired once its offset has elapsed since the start of the
    /// run. An event that is already due (because an earlier event took
    /// longer than the gap) is fired without waiting. After the last event
    /// the remaining wait is slept off before `on_wake`.
    pub async fn run<F>(
        &mut self,
        clock: &dyn Clock,
        emitter: &dyn SignalEmitter,
        total_wait: Duration,
        on_wake: F,
    ) -> Result<ScheduleReport>
    where
        F: FnOnce() + Send,
    {
        for id in &self.order {
            if let Some(event) = self.events.get_mut(*id) {
                event.set_sleep_length(total_wait);
            }
        }

        let mut due = Vec::with_capacity(self.order.len());
        for &id in &self.order {
            if let Some(event) = self.events.get(id) {
                due.push((event.time()?, id));
            }
        }
        due.sort_by_key(|&(offset, _)| offset);

        let ctx = FireContext { clock, emitter };
        let start = clock.now();
        let mut report = ScheduleReport::default();
        info!(?total_wait, events = due.len(), "schedule started");

        for (offset, id) in due {
            let elapsed = clock.now().saturating_duration_since(start);
            if let Some(remaining) = offset.checked_sub(elapsed).filter(|d| !d.is_zero()) {
                trace!(?id, ?remaining, "waiting for next event");
                clock.sleep(remaining).await;
            }

            let Some(event) = self.events.get_mut(id) else {
                continue;
            };
            let name = event.name();
            event.fire(&ctx).await?;

            if offset.is_zero() {
                debug!(name, "event skipped, period exceeds wait");
                self.notify(AlarmEvent::EventSkipped { id, name });
            } else {
                info!(name, ?offset, "event fired");
                self.notify(AlarmEvent::EventFired { id, name, offset });
            }
            report.fired.push((id, name, offset));
        }

        let elapsed = clock.now().saturating_duration_since(start);
        if let Some(remaining) = total_wait.checked_sub(elapsed).filter(|d| !d.is_zero()) {
            trace!(?remaining, "waiting for wake time");
            clock.sleep(remaining).await;
        }

        report.elapsed = clock.now().saturating_duration_since(start);
        info!(elapsed = ?report.elapsed, "wake time reached");
        on_wake();
        Ok(report)
    }

    fn notify(&self, event: AlarmEvent) {
        if let Some(sender) = &self.event_sender {
            sender.send(event).ok();
        }
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}
