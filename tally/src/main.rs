//! tally - send behavioral analytics events from the command line
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/tally/config.toml (~/.config/tally/config.toml)
//! - Logs: $XDG_STATE_HOME/tally/ (~/.local/state/tally/)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally_core::{Config, Properties, Tracker, EVENTS_ENDPOINT};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Send behavioral analytics events")]
#[command(version)]
struct Args {
    /// Write diagnostics to the log file
    #[arg(short, long)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracker configuration
    Status,

    /// Track one event for a user and wait for it to be sent
    Track {
        /// User the event belongs to
        user_id: String,

        /// Event name
        event: String,

        /// Event property as key=value (value parsed as JSON when possible)
        #[arg(short, long = "prop")]
        props: Vec<String>,

        /// Persistent property as key=value, attached to the client
        #[arg(long = "persistent")]
        persistent: Vec<String>,

        /// Session start in epoch milliseconds; `now` starts one at the current time
        #[arg(short, long)]
        session: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {:?}", path))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let _log_guard = if args.verbose {
        Some(tally_core::logging::init(&config.logging).context("failed to initialize logging")?)
    } else {
        None
    };

    match args.command {
        Command::Status => cmd_status(&config),
        Command::Track {
            user_id,
            event,
            props,
            persistent,
            session,
        } => cmd_track(&config, &user_id, &event, &props, &persistent, session.as_deref()),
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Tally Configuration");
    println!("===================");
    println!();

    let tracker = &config.tracker;
    println!(
        "API Key:         {}",
        tracker
            .resolved_api_key()
            .map(|key| mask(&key))
            .unwrap_or_else(|| "<not set>".to_string())
    );
    println!("Endpoint:        {}", EVENTS_ENDPOINT);
    println!("Timeout:         {}s", tracker.timeout_secs);
    println!("Log Level:       {}", config.logging.level);
    println!("Log File:        {}", tally_core::logging::log_file_path().display());
    println!("Config File:     {}", Config::config_path().display());

    if !tracker.is_ready() {
        println!();
        println!("No API key configured. Set TALLY_API_KEY or add to config.toml:");
        println!();
        println!("  [tracker]");
        println!("  api_key = \"your-api-key\"");
    }

    Ok(())
}

fn cmd_track(
    config: &Config,
    user_id: &str,
    event: &str,
    props: &[String],
    persistent: &[String],
    session: Option<&str>,
) -> Result<()> {
    let properties = parse_properties(props)?;
    let persistent = parse_properties(persistent)?;
    let session = session.map(parse_session).transpose()?;

    let tracker = Tracker::from_config(&config.tracker).context("failed to create tracker")?;
    let client = tracker
        .instance_for(user_id, (!persistent.is_empty()).then_some(persistent))
        .context("failed to create tracking client")?;

    if let Some(start) = session {
        client.start_session(start);
    }
    tracing::info!(user_id = %user_id, event_type = %event, "Tracking event");
    client.track(event, (!properties.is_empty()).then_some(properties));

    tracker.shutdown();

    let stats = tracker.stats();
    println!(
        "Submitted {}, delivered {}, failed {}, dropped {}",
        stats.submitted, stats.delivered, stats.failed, stats.dropped
    );
    if stats.delivered == 0 {
        eprintln!("Event was not delivered; run with --verbose and check the log file");
    }

    Ok(())
}

/// Parse `key=value` pairs; values that are valid JSON keep their type
fn parse_properties(pairs: &[String]) -> Result<Properties> {
    let mut properties = Properties::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("invalid property {:?}, expected key=value", pair);
        };
        if key.is_empty() {
            bail!("invalid property {:?}, key is empty", pair);
        }
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        properties.insert(key.to_string(), value);
    }
    Ok(properties)
}

/// `now` maps to `None` (start at the current time)
fn parse_session(raw: &str) -> Result<Option<i64>> {
    if raw == "now" {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .with_context(|| format!("invalid session start {:?}", raw))
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}****", visible)
}
