//! Basic CLI E2E tests.
//!
//! Tests run the built `wakeup` binary against a throwaway config.

use std::path::Path;
use std::process::Command;

/// Run the CLI with a config file and return (code, stdout, stderr).
fn run_cli(config: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_wakeup"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("QUIET_MODE", "1")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (output.status.code().unwrap_or(-1), stdout, stderr)
}

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let words = dir.join("words");
    std::fs::write(&words, "lantern\nharbor\n").unwrap();
    let config = dir.join("wakeup.toml");
    std::fs::write(
        &config,
        format!(
            "word_source = {:?}\nlog_path = {:?}\n{extra}",
            words,
            dir.join("sleeplog")
        ),
    )
    .unwrap();
    config
}

#[test]
fn test_history_lists_sessions_and_mean() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    std::fs::write(
        dir.path().join("sleeplog"),
        "7.00#2026-03-01T23:05:00+01:00 18.3 6\n\
         not a record\n\
         8.00#2026-03-02T22:50:00+01:00 9.0 4\n",
    )
    .unwrap();

    let (code, stdout, _) = run_cli(&config, &["--history"]);
    assert_eq!(code, 0, "history failed");
    assert!(stdout.contains("2026-03-01 23:05"));
    assert!(stdout.contains("7.50h over 2 sessions"));
}

#[test]
fn test_history_without_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let (code, stdout, _) = run_cli(&config, &["--history"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No sessions recorded"));
}

#[test]
fn test_simulated_session_completes() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[passphrase]\nmin_words = 2\nmax_words = 2\n",
    );

    // An hour ago locally, so the wake target is almost a day away.
    let wake = (chrono::Local::now() - chrono::Duration::hours(1)).format("%H:%M").to_string();
    let (code, stdout, stderr) = run_cli(&config, &["--simulate", "--acclimate", &wake]);
    assert_eq!(code, 0, "simulate failed: {stderr}");
    assert!(stdout.contains("fired          acclimate"));
    assert!(stdout.contains("cues           5"));
    assert!(stdout.contains("log line"));
    // Simulations never touch the real sleep log.
    assert!(!dir.path().join("sleeplog").exists());
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "[passphrase]\nmin_words = 5\nmax_words = 2\n",
    );

    let (code, _, stderr) = run_cli(&config, &["--simulate", "06:30"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("loading configuration"));
}

#[test]
fn test_malformed_wake_time_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let (code, _, stderr) = run_cli(&config, &["--simulate", "25:99"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("invalid wake time"));
}
