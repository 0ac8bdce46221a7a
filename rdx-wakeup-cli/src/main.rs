mod prompt;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use colored::Colorize;
use prompt::{ask_wake_time, TerminalPrompt};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wakeup::prelude::*;
use wakeup::session_log::{mean_hours_slept, read_log, MemorySink};
use wakeup::signal::RecordingEmitter;
use wakeup::{ENGINE_NAME, VERSION as LIB_VERSION};

const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause before a failed shutoff challenge is offered again.
const CHALLENGE_RETRY: Duration = Duration::from_secs(5);

/// Sleep until a wake time, then make you type your way out of the alarm.
#[derive(Parser, Debug)]
#[command(name = "wakeup", version, about)]
struct Cli {
    /// Wake time as HH:MM. Asked for interactively when omitted.
    time: Option<String>,

    /// Play soft cues that get more frequent in the minutes before waking.
    #[arg(short, long)]
    acclimate: bool,

    /// Sound a short wake burst an hour before waking.
    #[arg(short = 'x', long)]
    accelerate: bool,

    /// Do not record this session in the sleep log.
    #[arg(long)]
    no_log: bool,

    /// Configuration file (TOML). Missing files fall back to defaults.
    #[arg(short, long, default_value = "wakeup.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Show recorded sessions and the average hours slept, then exit.
    #[arg(long, conflicts_with_all = ["time", "acclimate", "accelerate", "simulate"])]
    history: bool,

    /// How many recent sessions `--history` lists.
    #[arg(long, default_value_t = 10, requires = "history")]
    last: usize,

    /// Run the whole session on virtual time with a scripted shutoff.
    #[arg(long)]
    simulate: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", ENGINE_NAME.to_lowercase().cyan().bold());
    println!(
        "{}",
        format!("  cli v{:<8} engine v{:<8}", CLI_VERSION, LIB_VERSION).dimmed()
    );
    println!("{}", "-".repeat(48).dimmed());
}

fn format_wait(wait: Duration) -> String {
    let minutes = wait.as_secs() / 60;
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

/// Prints session progress as it is broadcast by the alarm.
fn spawn_event_listener(alarm: &Alarm) {
    let mut rx = alarm.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                AlarmEvent::SessionStarted {
                    wake_at,
                    wait,
                    message,
                    ..
                } => {
                    println!(
                        "Alarm set for {} ({} from now)",
                        wake_at.with_timezone(&Local).format("%a %H:%M").to_string().bold(),
                        format_wait(wait)
                    );
                    if let Some(message) = message {
                        println!("{}", message.blue().bold());
                    }
                }
                AlarmEvent::EventFired { name, offset, .. } => {
                    let line = format!("[{name}] after {}", format_wait(offset));
                    println!("{} {}", "<--".dimmed(), line.cyan());
                }
                AlarmEvent::EventSkipped { name, .. } => {
                    let line = format!("<-- [{name}] skipped, not enough time before wake");
                    println!("{}", line.dimmed());
                }
                AlarmEvent::WakeSignalStarted => {
                    println!("\n{}", "Wake up!".yellow().bold());
                }
                AlarmEvent::SessionCompleted { entry } => {
                    println!(
                        "{} slept {:.2}h, shut off in {:.1}s",
                        "Good morning.".green().bold(),
                        entry.hours_slept,
                        entry.shutoff.as_secs_f64()
                    );
                }
                AlarmEvent::StateChanged { .. } | AlarmEvent::ShutoffRejected { .. } => {}
            }
        }
    });
}

fn show_history(config: &WakeupConfig, last: usize) -> Result<()> {
    let entries = read_log(&config.log_path)
        .with_context(|| format!("reading sleep log {}", config.log_path.display()))?;
    let Some(mean) = mean_hours_slept(&entries) else {
        println!("No sessions recorded in {}", config.log_path.display());
        return Ok(());
    };

    println!("{:<20} {:>7} {:>9} {:>6}", "started", "hours", "shutoff", "words");
    for entry in entries.iter().rev().take(last).rev() {
        println!(
            "{:<20} {:>7.2} {:>8.1}s {:>6}",
            entry.started_at.format("%Y-%m-%d %H:%M"),
            entry.hours_slept,
            entry.shutoff.as_secs_f64(),
            entry.passphrase_words
        );
    }
    println!(
        "{} {:.2}h over {} sessions",
        "average:".bold(),
        mean,
        entries.len()
    );
    Ok(())
}

fn resolve_wake_time(
    arg: Option<String>,
    config: &WakeupConfig,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let hhmm = match arg {
        Some(time) => time,
        None => ask_wake_time().context("reading wake time")?,
    };
    let wake_at = match config.timezone {
        Some(tz) => next_occurrence(&hhmm, &now.with_timezone(&tz))?.with_timezone(&Utc),
        None => next_occurrence(&hhmm, &now.with_timezone(&Local))?.with_timezone(&Utc),
    };
    Ok(wake_at)
}

async fn simulate(cli: &Cli, config: WakeupConfig) -> Result<()> {
    let clock = Arc::new(SimulatedClock::default());
    let emitter = Arc::new(RecordingEmitter::new());
    let sink = Arc::new(MemorySink::new());
    let wake_at = resolve_wake_time(cli.time.clone(), &config, clock.wall_now())?;

    let mut alarm = Alarm::new(wake_at, config)
        .with_clock(clock.clone())
        .with_emitter(emitter.clone())
        .with_sink(Box::new(sink.clone()));
    if cli.acclimate {
        alarm.acclimate();
    }
    if cli.accelerate {
        alarm.accelerate();
    }
    spawn_event_listener(&alarm);

    let outcome = alarm
        .run(Box::new(ScriptedPrompt::default().echoing()))
        .await?;
    // Let the listener drain before the summary.
    tokio::task::yield_now().await;

    println!("{}", "simulation".bold());
    println!("  virtual time   {}", format_wait(clock.elapsed()));
    println!("  sleeps         {}", clock.sleeps().len());
    println!(
        "  cues           {}",
        emitter.count(|s| matches!(s, Signal::Cue { .. }))
    );
    println!("  wake signals   {}", emitter.count(|s| *s == Signal::Wake));
    for (_, name, offset) in &outcome.schedule.fired {
        if offset.is_zero() {
            println!("  skipped        {name}");
        } else {
            println!("  fired          {name} at {}", format_wait(*offset));
        }
    }
    for entry in sink.entries() {
        println!("  log line       {entry}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = WakeupConfig::load(Some(&cli.config))
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    if cli.history {
        return show_history(&config, cli.last);
    }

    print_banner();

    if cli.simulate {
        return simulate(&cli, config).await;
    }

    let wake_at = resolve_wake_time(cli.time.clone(), &config, Utc::now())?;
    let mut alarm = Alarm::new(wake_at, config);
    if cli.no_log {
        alarm = alarm.without_log();
    }
    if cli.acclimate {
        alarm.acclimate();
    }
    if cli.accelerate {
        alarm.accelerate();
    }
    spawn_event_listener(&alarm);

    info!("{} v{} is running", ENGINE_NAME.cyan(), LIB_VERSION);

    tokio::select! {
        slept = alarm.go_to_sleep() => slept?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted before wake, session not recorded");
            std::process::exit(130);
        }
    }

    // From here on the alarm sounds until the passphrase is typed. A failed
    // challenge leaves it sounding and is simply taken up again.
    loop {
        let outcome = match TerminalPrompt::new() {
            Ok(prompt) => alarm.shut_off(Box::new(prompt)).await,
            Err(e) => Err(WakeError::Interrupted(e.to_string())),
        };
        match outcome {
            Ok(_) => return Ok(()),
            Err(e) if alarm.state() == AlarmState::AwaitingShutoff => {
                error!(error = %e, "shutoff challenge failed, retrying");
                tokio::time::sleep(CHALLENGE_RETRY).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
