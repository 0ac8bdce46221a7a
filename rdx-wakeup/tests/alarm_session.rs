//! End-to-end alarm sessions on virtual time.

use chrono::{TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wakeup::prelude::*;
use wakeup::session_log::{read_log, FileSink, MemorySink};
use wakeup::signal::RecordingEmitter;

struct Rig {
    clock: Arc<SimulatedClock>,
    emitter: Arc<RecordingEmitter>,
    sink: Arc<MemorySink>,
    words: tempfile::NamedTempFile,
}

impl Rig {
    fn new(words: &[&str]) -> Self {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for word in words {
            writeln!(file, "{word}").unwrap();
        }
        Self {
            clock: Arc::new(SimulatedClock::starting_at(
                Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap(),
            )),
            emitter: Arc::new(RecordingEmitter::new()),
            sink: Arc::new(MemorySink::new()),
            words: file,
        }
    }

    fn alarm(&self, wake_in: Duration, config: WakeupConfig) -> Alarm {
        let wake_at = self.clock.wall_now() + chrono::Duration::from_std(wake_in).unwrap();
        Alarm::new(wake_at, config)
            .with_clock(self.clock.clone())
            .with_emitter(self.emitter.clone())
            .with_sink(Box::new(self.sink.clone()))
            .with_word_source(WordSource::new(self.words.path()))
            .with_seed(42)
    }
}

fn three_word_config() -> WakeupConfig {
    let mut config = WakeupConfig::default();
    config.passphrase.min_words = 3;
    config.passphrase.max_words = 3;
    config
}

#[tokio::test]
async fn acclimate_only_session_sleeps_then_cues_then_wakes() {
    let rig = Rig::new(&["alpha"]);
    let mut alarm = rig.alarm(Duration::from_secs(400), WakeupConfig::default());
    alarm.acclimate();

    alarm.go_to_sleep().await.unwrap();
    assert_eq!(alarm.state(), AlarmState::Waking);

    let sleeps = rig.clock.sleeps();
    assert_eq!(sleeps[0], Duration::from_secs(100));
    assert_eq!(rig.clock.elapsed(), Duration::from_secs(400));
    assert_eq!(rig.emitter.count(|s| matches!(s, Signal::Cue { .. })), 5);

    let outcome = alarm
        .shut_off(Box::new(ScriptedPrompt::default().echoing()))
        .await
        .unwrap();
    assert_eq!(alarm.state(), AlarmState::Stopped);
    assert_eq!(outcome.schedule.fired.len(), 1);
    assert!((outcome.entry.hours_slept - 400.0 / 3600.0).abs() < 1e-9);
}

#[tokio::test]
async fn accelerate_with_short_wait_only_sleeps_until_wake() {
    let rig = Rig::new(&["alpha"]);
    let mut alarm = rig.alarm(Duration::from_secs(30), WakeupConfig::default());
    alarm.accelerate();

    let mut events = alarm.subscribe();
    alarm.go_to_sleep().await.unwrap();

    assert_eq!(rig.clock.sleeps(), vec![Duration::from_secs(30)]);
    let mut skipped = false;
    while let Ok(event) = events.try_recv() {
        if let AlarmEvent::EventSkipped { name, .. } = event {
            assert_eq!(name, "accelerate");
            skipped = true;
        }
    }
    assert!(skipped);
    alarm
        .shut_off(Box::new(ScriptedPrompt::default().echoing()))
        .await
        .unwrap();
}

#[tokio::test]
async fn both_events_fire_in_offset_order_across_a_night() {
    let rig = Rig::new(&["alpha"]);
    let mut alarm = rig.alarm(Duration::from_secs(8 * 3600), WakeupConfig::default());
    alarm.acclimate();
    alarm.accelerate();

    let mut events = alarm.subscribe();
    let outcome = alarm
        .run(Box::new(ScriptedPrompt::default().echoing()))
        .await
        .unwrap();

    let names: Vec<&str> = outcome.schedule.fired.iter().map(|(_, name, _)| *name).collect();
    assert_eq!(names, vec!["accelerate", "acclimate"]);
    assert_eq!(rig.clock.sleeps()[0], Duration::from_secs(7 * 3600));
    assert!((outcome.entry.hours_slept - 8.0).abs() < 1e-9);

    let mut fired = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let AlarmEvent::EventFired { name, offset, .. } = event {
            fired.push((name, offset));
        }
    }
    assert_eq!(
        fired,
        vec![
            ("accelerate", Duration::from_secs(7 * 3600)),
            ("acclimate", Duration::from_secs(8 * 3600 - 300)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn shutoff_loops_until_exact_match() {
    let rig = Rig::new(&["alpha"]);
    let mut alarm = rig.alarm(Duration::from_secs(60), three_word_config());
    let mut events = alarm.subscribe();

    let prompt = ScriptedPrompt::new([
        "alpha alpha",
        "alpha alpha alpha ",
        " alpha alpha alpha",
        "Alpha alpha alpha",
        "alpha  alpha alpha",
        "alpha alpha alpha",
    ]);
    let outcome = alarm.run(Box::new(prompt)).await.unwrap();

    assert_eq!(outcome.rejected_attempts, 5);
    assert_eq!(outcome.entry.passphrase_words, 3);
    // Scripted answers take no time, so the session clock does not move and
    // the wake signal sounds once.
    assert_eq!(outcome.wake_signals, 1);
    assert_eq!(outcome.entry.shutoff, Duration::ZERO);
    assert_eq!(rig.clock.elapsed(), Duration::from_secs(60));

    let rejections: Vec<u32> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            AlarmEvent::ShutoffRejected { attempt } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(rejections, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn completed_session_is_recorded_exactly_once() {
    let rig = Rig::new(&["alpha", "beta", "gamma"]);
    let mut alarm = rig.alarm(Duration::from_secs(120), WakeupConfig::default());
    let outcome = alarm
        .run(Box::new(ScriptedPrompt::new(["nope"]).echoing()))
        .await
        .unwrap();

    let entries = rig.sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0], outcome.entry);
    assert!((4..=8).contains(&entries[0].passphrase_words));
}

#[tokio::test]
async fn suppressed_logging_writes_nothing() {
    let rig = Rig::new(&["alpha"]);
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("sleeplog");

    let mut alarm = rig
        .alarm(Duration::from_secs(10), WakeupConfig::default())
        .with_sink(Box::new(FileSink::new(&log_path)))
        .without_log();
    alarm
        .run(Box::new(ScriptedPrompt::default().echoing()))
        .await
        .unwrap();

    assert!(!log_path.exists());
    assert!(rig.sink.entries().is_empty());
}

#[tokio::test]
async fn file_log_round_trips_through_the_reader() {
    let rig = Rig::new(&["alpha"]);
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("sleeplog");

    for _ in 0..2 {
        let mut alarm = rig
            .alarm(Duration::from_secs(3600), WakeupConfig::default())
            .with_sink(Box::new(FileSink::new(&log_path)));
        alarm
            .run(Box::new(ScriptedPrompt::default().echoing()))
            .await
            .unwrap();
    }

    let entries = read_log(&log_path).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| (e.hours_slept - 1.0).abs() < 1e-9));
}

#[tokio::test]
async fn unwritable_log_does_not_abort_the_session() {
    let rig = Rig::new(&["alpha"]);
    let mut alarm = rig
        .alarm(Duration::from_secs(10), WakeupConfig::default())
        .with_sink(Box::new(FileSink::new("/nonexistent/dir/sleeplog")));

    let outcome = alarm
        .run(Box::new(ScriptedPrompt::default().echoing()))
        .await;
    assert!(outcome.is_ok());
    assert_eq!(alarm.state(), AlarmState::Stopped);
}

#[tokio::test]
async fn latin1_word_list_still_wakes_and_shuts_off() {
    let mut words = tempfile::NamedTempFile::new().unwrap();
    words.write_all(b"alpha\nAngstr\xf6m\nbeta\n").unwrap();
    let rig = Rig::new(&["unused"]);
    let mut alarm = rig
        .alarm(Duration::from_secs(8 * 3600), three_word_config())
        .with_word_source(WordSource::new(words.path()));

    let outcome = alarm
        .run(Box::new(ScriptedPrompt::default().echoing()))
        .await
        .unwrap();

    assert_eq!(rig.clock.elapsed(), Duration::from_secs(8 * 3600));
    assert!(outcome.wake_signals >= 1);
    let entry = &rig.sink.entries()[0];
    assert_eq!(entry.passphrase_words, 3);
}

#[tokio::test]
async fn missing_word_source_is_reported_before_sleeping() {
    let rig = Rig::new(&["alpha"]);
    let mut alarm = rig
        .alarm(Duration::from_secs(3600), WakeupConfig::default())
        .with_word_source(WordSource::new("/nonexistent/words"));

    let err = alarm.go_to_sleep().await.unwrap_err();
    assert!(matches!(err, WakeError::ResourceUnavailable { .. }));
    assert!(rig.clock.sleeps().is_empty());
    assert_eq!(alarm.state(), AlarmState::Idle);
}
