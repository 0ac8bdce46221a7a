//! The alarm: sleeps until the wake target, then guards the wake signal with
//! a passphrase challenge.

use crate::common::EventId;
use crate::components::signal_loop::SignalLoop;
use crate::components::sleep_event::{AccelerateEvent, AcclimateEvent, SleepEvent};
use crate::config::WakeupConfig;
use crate::engine::{EventScheduler, ScheduleReport};
use crate::error::{Result, WakeError};
use crate::events::{AlarmEvent, AlarmState};
use crate::passphrase::{Passphrase, WordSource};
use crate::session_log::{FileSink, SessionSink, SleepLogEntry};
use crate::signal::{CommandEmitter, SignalEmitter, TerminalBell};
use crate::time::{Clock, SystemClock};
use chrono::{DateTime, Local, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Asks the user to retype the passphrase.
///
/// `ask` blocks until a line is entered and is run on tokio's blocking pool
/// while the wake signal keeps going. `Ok(None)` means input is closed: the
/// challenge returns `Interrupted` and the wake signal keeps sounding.
pub trait ShutoffPrompt: Send + 'static {
    fn ask(&mut self, instructions: &str, passphrase: &Passphrase) -> Result<Option<String>>;

    /// Called after every mismatching attempt.
    fn reject(&mut self, message: &str);
}

/// Answers from a fixed script, then optionally types the passphrase itself.
/// Used by simulations and tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    echo_when_exhausted: bool,
    rejections: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Messages passed to `reject`, in order.
    pub fn rejections(&self) -> &[String] {
        &self.rejections
    }

    /// Types the correct passphrase once the scripted answers run out.
    pub fn echoing(mut self) -> Self {
        self.echo_when_exhausted = true;
        self
    }
}

impl ShutoffPrompt for ScriptedPrompt {
    fn ask(&mut self, _instructions: &str, passphrase: &Passphrase) -> Result<Option<String>> {
        match self.answers.pop_front() {
            Some(answer) => Ok(Some(answer)),
            None if self.echo_when_exhausted => Ok(Some(passphrase.as_str().to_string())),
            None => Ok(None),
        }
    }

    fn reject(&mut self, message: &str) {
        self.rejections.push(message.to_string());
    }
}

/// The result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub entry: SleepLogEntry,
    pub schedule: ScheduleReport,
    pub rejected_attempts: u32,
    pub wake_signals: u64,
}

#[derive(Debug, Clone, Copy)]
struct SessionTimes {
    started_at: DateTime<Utc>,
    asleep_at: Instant,
    woke_at: Option<Instant>,
}

/// A one-shot alarm session.
///
/// `Idle -> Sleeping` on `go_to_sleep`, `-> Waking` once the scheduler has
/// run every event and the remaining wait, `-> AwaitingShutoff` when the
/// challenge begins, `-> Stopped` when the passphrase is typed correctly.
pub struct Alarm {
    config: Arc<WakeupConfig>,
    wake_at: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    emitter: Arc<dyn SignalEmitter>,
    sink: Option<Box<dyn SessionSink>>,
    words: WordSource,
    scheduler: EventScheduler,
    state: AlarmState,
    event_sender: broadcast::Sender<AlarmEvent>,
    rng: StdRng,
    times: Option<SessionTimes>,
    schedule: Option<ScheduleReport>,
    signal: Option<SignalLoop>,
}

impl Alarm {
    /// Creates an alarm for `wake_at` with real time, the configured signal
    /// emitter, word source and log file.
    pub fn new(wake_at: DateTime<Utc>, config: WakeupConfig) -> Self {
        const CHANNEL_CAPACITY: usize = 64;
        let (event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let emitter: Arc<dyn SignalEmitter> =
            match CommandEmitter::from_command(&config.signal.command) {
                Some(command) => Arc::new(command),
                None => Arc::new(TerminalBell),
            };
        Self {
            words: WordSource::new(config.word_source.clone()),
            sink: Some(Box::new(FileSink::new(config.log_path.clone()))),
            scheduler: EventScheduler::with_event_sender(event_sender.clone()),
            config: Arc::new(config),
            wake_at,
            clock: Arc::new(SystemClock),
            emitter,
            state: AlarmState::Idle,
            event_sender,
            rng: StdRng::from_entropy(),
            times: None,
            schedule: None,
            signal: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SignalEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn SessionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Suppresses the session record entirely.
    pub fn without_log(mut self) -> Self {
        self.sink = None;
        self
    }

    pub fn with_word_source(mut self, words: WordSource) -> Self {
        self.words = words;
        self
    }

    /// Makes the sleep message and passphrase reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Adds the configured acclimation cues.
    pub fn acclimate(&mut self) -> EventId {
        self.add_event(Box::new(AcclimateEvent::from_config(&self.config.acclimate)))
    }

    /// Adds the configured early wake burst.
    pub fn accelerate(&mut self) -> EventId {
        self.add_event(Box::new(AccelerateEvent::from_config(&self.config.accelerate)))
    }

    pub fn add_event(&mut self, event: Box<dyn SleepEvent>) -> EventId {
        self.scheduler.add(event)
    }

    pub fn remove_event(&mut self, id: EventId) -> bool {
        self.scheduler.remove(id)
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn wake_at(&self) -> DateTime<Utc> {
        self.wake_at
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlarmEvent> {
        self.event_sender.subscribe()
    }

    /// Runs the full session: sleep, wake, shutoff challenge.
    pub async fn run(&mut self, prompt: Box<dyn ShutoffPrompt>) -> Result<SessionOutcome> {
        self.go_to_sleep().await?;
        self.shut_off(prompt).await
    }

    /// Sleeps until the wake target, firing every sleep event on the way,
    /// then starts the repeating wake signal.
    ///
    /// Configuration problems (including an empty or unreadable word source)
    /// are reported before any waiting begins.
    pub async fn go_to_sleep(&mut self) -> Result<()> {
        self.expect_state(AlarmState::Idle)?;
        self.config.validate()?;
        self.words.validate()?;

        let started_at = self.clock.wall_now();
        let asleep_at = self.clock.now();
        // A target in the past means no wait at all.
        let wait = (self.wake_at - started_at).to_std().unwrap_or(Duration::ZERO);
        let message = self.config.messages.sleep.choose(&mut self.rng).cloned();

        self.times = Some(SessionTimes {
            started_at,
            asleep_at,
            woke_at: None,
        });
        info!(
            wake_at = %self.wake_at.with_timezone(&Local),
            ?wait,
            events = self.scheduler.len(),
            "going to sleep"
        );
        self.notify(AlarmEvent::SessionStarted {
            started_at,
            wake_at: self.wake_at,
            wait,
            message,
        });
        self.transition(AlarmState::Sleeping);

        let mut signal = None;
        let slot = &mut signal;
        let emitter = self.emitter.clone();
        let interval = self.config.signal_interval();
        let report = self
            .scheduler
            .run(self.clock.as_ref(), self.emitter.as_ref(), wait, move || {
                *slot = Some(SignalLoop::start(emitter, interval));
            })
            .await?;

        self.signal = signal;
        if let Some(times) = self.times.as_mut() {
            times.woke_at = Some(self.clock.now());
        }
        self.schedule = Some(report);
        self.transition(AlarmState::Waking);
        self.notify(AlarmEvent::WakeSignalStarted);
        Ok(())
    }

    /// Runs the passphrase challenge until the correct phrase is typed, then
    /// stops the wake signal and records the session.
    ///
    /// Mismatches are reported through `prompt.reject` and retried without
    /// limit. The wake signal only stops on a correct phrase: if the
    /// challenge fails (input closed, prompt error, word source gone) the
    /// error is returned, the alarm stays in `AwaitingShutoff` with the
    /// signal still sounding, nothing is recorded, and `shut_off` may be
    /// called again. Dropping the alarm silences it.
    pub async fn shut_off(&mut self, mut prompt: Box<dyn ShutoffPrompt>) -> Result<SessionOutcome> {
        match self.state {
            AlarmState::Waking => self.transition(AlarmState::AwaitingShutoff),
            AlarmState::AwaitingShutoff => info!("resuming shutoff challenge"),
            actual => {
                return Err(WakeError::InvalidState {
                    expected: AlarmState::Waking,
                    actual,
                })
            }
        }

        let range = self.config.passphrase.min_words..=self.config.passphrase.max_words;
        let passphrase = self.words.generate(range, &mut self.rng).map_err(|e| {
            error!(error = %e, "no passphrase, wake signal keeps sounding");
            e
        })?;
        info!(words = passphrase.len(), "shutoff challenge started");

        let mut rejected_attempts: u32 = 0;
        loop {
            let instructions = self.config.messages.shutoff.clone();
            let shown = passphrase.clone();
            let asked = tokio::task::spawn_blocking(move || {
                let answer = prompt.ask(&instructions, &shown);
                (prompt, answer)
            })
            .await;

            let (returned, answer) =
                asked.map_err(|e| WakeError::Interrupted(e.to_string()))?;
            prompt = returned;
            let input = match answer? {
                Some(input) => input,
                None => {
                    warn!("shutoff input closed, wake signal keeps sounding");
                    return Err(WakeError::Interrupted("shutoff input closed".to_string()));
                }
            };

            match passphrase.verify(&input) {
                Ok(()) => break,
                Err(e) => {
                    rejected_attempts += 1;
                    warn!(attempt = rejected_attempts, error = %e, "shutoff rejected");
                    prompt.reject(&self.config.messages.incorrect);
                    self.notify(AlarmEvent::ShutoffRejected {
                        attempt: rejected_attempts,
                    });
                }
            }
        }

        let wake_signals = self.stop_signal().await;
        let entry = self.session_entry(passphrase.len())?;
        drop(passphrase);

        match &self.sink {
            Some(sink) => {
                if let Err(e) = sink.record(&entry) {
                    warn!(error = %e, "could not record sleep session");
                }
            }
            None => info!("session logging suppressed"),
        }

        self.transition(AlarmState::Stopped);
        info!(shutoff = ?entry.shutoff, rejected_attempts, "alarm stopped");
        self.notify(AlarmEvent::SessionCompleted {
            entry: entry.clone(),
        });

        Ok(SessionOutcome {
            entry,
            schedule: self.schedule.take().unwrap_or_default(),
            rejected_attempts,
            wake_signals,
        })
    }

    fn session_entry(&self, passphrase_words: usize) -> Result<SleepLogEntry> {
        let times = self.times.ok_or(WakeError::InvalidState {
            expected: AlarmState::AwaitingShutoff,
            actual: self.state,
        })?;
        let woke_at = times.woke_at.unwrap_or(times.asleep_at);
        let now = self.clock.now();
        Ok(SleepLogEntry {
            hours_slept: woke_at.saturating_duration_since(times.asleep_at).as_secs_f64() / 3600.0,
            started_at: times.started_at.with_timezone(&Local).fixed_offset(),
            shutoff: now.saturating_duration_since(woke_at),
            passphrase_words,
        })
    }

    async fn stop_signal(&mut self) -> u64 {
        match self.signal.take() {
            Some(signal) => signal.stop().await,
            None => 0,
        }
    }

    fn expect_state(&self, expected: AlarmState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(WakeError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn transition(&mut self, to: AlarmState) {
        let from = self.state;
        self.state = to;
        info!(%from, %to, "alarm state changed");
        self.notify(AlarmEvent::StateChanged { from, to });
    }

    fn notify(&self, event: AlarmEvent) {
        self.event_sender.send(event).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{RecordingEmitter, Signal};
    use crate::time::SimulatedClock;
    use chrono::TimeZone;
    use std::io::Write;

    fn word_file(words: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for word in words {
            writeln!(file, "{word}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn shut_off_before_sleeping_is_rejected() {
        let mut alarm = Alarm::new(Utc::now(), WakeupConfig::default()).without_log();
        let err = alarm
            .shut_off(Box::new(ScriptedPrompt::new(Vec::<String>::new())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WakeError::InvalidState {
                expected: AlarmState::Waking,
                actual: AlarmState::Idle
            }
        ));
    }

    #[tokio::test]
    async fn empty_word_source_fails_before_sleeping() {
        let words = word_file(&[]);
        let clock = Arc::new(SimulatedClock::default());
        let wake_at = clock.wall_now() + chrono::Duration::hours(8);
        let mut alarm = Alarm::new(wake_at, WakeupConfig::default())
            .with_clock(clock.clone())
            .with_word_source(WordSource::new(words.path()))
            .without_log();

        let err = alarm.go_to_sleep().await.unwrap_err();
        assert!(matches!(err, WakeError::Configuration(_)));
        assert_eq!(alarm.state(), AlarmState::Idle);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn past_wake_target_wakes_immediately() {
        let words = word_file(&["lantern"]);
        let wall = Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap();
        let clock = Arc::new(SimulatedClock::starting_at(wall));
        let emitter = Arc::new(RecordingEmitter::new());
        let mut alarm = Alarm::new(wall - chrono::Duration::minutes(5), WakeupConfig::default())
            .with_clock(clock.clone())
            .with_emitter(emitter.clone())
            .with_word_source(WordSource::new(words.path()))
            .without_log();
        alarm.acclimate();

        alarm.go_to_sleep().await.unwrap();
        assert_eq!(alarm.state(), AlarmState::Waking);
        assert!(clock.sleeps().is_empty());

        let outcome = alarm
            .shut_off(Box::new(ScriptedPrompt::default().echoing()))
            .await
            .unwrap();
        assert_eq!(outcome.entry.hours_slept, 0.0);
        assert_eq!(emitter.count(|s| matches!(s, Signal::Cue { .. })), 0);
        assert!(emitter.count(|s| *s == Signal::Wake) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_input_keeps_the_alarm_sounding() {
        let words = word_file(&["lantern", "harbor"]);
        let clock = Arc::new(SimulatedClock::default());
        let emitter = Arc::new(RecordingEmitter::new());
        let sink = Arc::new(crate::session_log::MemorySink::new());
        let wake_at = clock.wall_now() + chrono::Duration::minutes(1);
        let mut alarm = Alarm::new(wake_at, WakeupConfig::default())
            .with_clock(clock.clone())
            .with_emitter(emitter.clone())
            .with_word_source(WordSource::new(words.path()))
            .with_sink(Box::new(sink.clone()));
        let wake_signals = || emitter.count(|s| *s == Signal::Wake);

        let err = alarm
            .run(Box::new(ScriptedPrompt::new(["wrong"])))
            .await
            .unwrap_err();
        assert!(matches!(err, WakeError::Interrupted(_)));
        assert_eq!(alarm.state(), AlarmState::AwaitingShutoff);
        assert!(sink.entries().is_empty());

        let before = wake_signals();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(wake_signals() >= before + 30);

        // The challenge can be taken up again; only then does the signal stop.
        alarm
            .shut_off(Box::new(ScriptedPrompt::default().echoing()))
            .await
            .unwrap();
        assert_eq!(alarm.state(), AlarmState::Stopped);
        assert_eq!(sink.entries().len(), 1);
        let after_stop = wake_signals();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(wake_signals(), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_word_source_at_wake_keeps_the_alarm_sounding() {
        let words = word_file(&["lantern"]);
        let path = words.path().to_path_buf();
        let clock = Arc::new(SimulatedClock::default());
        let emitter = Arc::new(RecordingEmitter::new());
        let wake_at = clock.wall_now() + chrono::Duration::hours(8);
        let mut alarm = Alarm::new(wake_at, WakeupConfig::default())
            .with_clock(clock.clone())
            .with_emitter(emitter.clone())
            .with_word_source(WordSource::new(&path))
            .without_log();

        alarm.go_to_sleep().await.unwrap();
        drop(words);

        let err = alarm
            .shut_off(Box::new(ScriptedPrompt::default().echoing()))
            .await
            .unwrap_err();
        assert!(matches!(err, WakeError::ResourceUnavailable { .. }));
        assert_eq!(alarm.state(), AlarmState::AwaitingShutoff);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(emitter.count(|s| *s == Signal::Wake) >= 20);
    }
}
