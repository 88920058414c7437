//! midi-propagation - replay MIDI traffic through a device project
//!
//! Reads lines of `<device id>: <hex bytes>` and prints what each event
//! propagates to software clients, sends back to the hardware and mirrors
//! to other devices.

use anyhow::{Context, Result};
use clap::Parser;
use midi_propagation::config::AppConfig;
use midi_propagation::project::Project;
use midi_propagation::wire::{format_hex, parse_hex, WireEvent};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Replay MIDI events through configured devices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Saved project to load (overrides the one in the configuration)
    #[arg(short, long)]
    project: Option<String>,

    /// Events to replay, `-` for stdin
    #[arg(short, long, default_value = "-")]
    events: String,

    /// Save the resulting project to this file
    #[arg(long)]
    save: Option<String>,

    /// Save propagator state with the project
    #[arg(long, conflicts_with = "no_state")]
    include_state: bool,

    /// Save the project without propagator state
    #[arg(long)]
    no_state: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Some(AppConfig::load(path).await?),
        None => None,
    };

    let level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level)?;

    info!("Starting midi-propagation replay...");

    let mut project = match (&args.project, &config) {
        (Some(path), _) => Project::load_from_file(path).await?,
        (None, Some(config)) => config.build_project().await?,
        (None, None) => anyhow::bail!("Either --config or --project is required"),
    };

    let input = read_events(&args.events).await?;
    let mut replayed = 0usize;

    for (line_no, line) in input.lines().enumerate() {
        let Some((device_id, event)) = parse_line(line)
            .with_context(|| format!("Invalid event on line {}", line_no + 1))?
        else {
            continue;
        };

        let routed = project
            .handle_message(&device_id, event)
            .with_context(|| format!("Failed to route line {}", line_no + 1))?;
        replayed += 1;

        println!(
            "{}: {} -> propagated: {} | feedback: {}",
            device_id,
            format_hex(&event.to_bytes()),
            describe(routed.propagated),
            describe(routed.feedback)
        );
        for shared in &routed.shared {
            println!(
                "  shared -> {}: {}",
                shared.device_id,
                format_hex(&shared.event.to_bytes())
            );
        }
    }

    info!("Replayed {} events", replayed);

    if let Some(path) = &args.save {
        let include_state = resolve_include_state(&args, config.as_ref());
        project.save_to_file(path, include_state).await?;
    }

    Ok(())
}

async fn read_events(source: &str) -> Result<String> {
    if source == "-" {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("Failed to read events from stdin")?;
        Ok(input)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read events file: {}", source))
    }
}

/// Parse `<device id>: <hex bytes>`; blank lines and `#` comments yield `None`
fn parse_line(line: &str) -> Result<Option<(String, WireEvent)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (device_id, hex) = line
        .rsplit_once(':')
        .context("Expected '<device id>: <hex bytes>'")?;

    let bytes = parse_hex(hex).with_context(|| format!("Invalid hex bytes: '{}'", hex.trim()))?;

    match WireEvent::parse(&bytes) {
        Some(event) => Ok(Some((device_id.trim().to_string(), event))),
        None => {
            warn!("Ignoring unsupported message: {}", format_hex(&bytes));
            Ok(None)
        }
    }
}

/// Command-line switches win over the configuration; state is saved by default
fn resolve_include_state(args: &Args, config: Option<&AppConfig>) -> bool {
    if args.include_state {
        true
    } else if args.no_state {
        false
    } else {
        config.map_or(true, |c| c.include_state)
    }
}

fn describe(event: Option<WireEvent>) -> String {
    event.map_or_else(|| "-".to_string(), |e| format_hex(&e.to_bytes()))
}

/// Initialize logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let (device, event) = parse_line("Pads 0: 99 24 64").unwrap().unwrap();
        assert_eq!(device, "Pads 0");
        assert_eq!(event, WireEvent::note_on(9, 0x24, 0x64));

        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# comment").unwrap().is_none());
        assert!(parse_line("Pads 0: F8").unwrap().is_none());
        assert!(parse_line("Pads 0 99 24 64").is_err());
        assert!(parse_line("Pads 0: zz").is_err());
    }

    #[test]
    fn test_include_state_switches() {
        let args = |extra: &[&str]| {
            Args::try_parse_from(["midi-propagation", "--save", "out.json"].iter().chain(extra).copied())
                .unwrap()
        };
        let config: AppConfig = serde_yaml::from_str("include_state: false\n").unwrap();

        assert!(resolve_include_state(&args(&[]), None));
        assert!(!resolve_include_state(&args(&[]), Some(&config)));
        assert!(resolve_include_state(&args(&["--include-state"]), Some(&config)));
        assert!(!resolve_include_state(&args(&["--no-state"]), None));

        // A bare switch no longer swallows the next argument
        let parsed = args(&["--include-state", "--events", "log.txt"]);
        assert!(parsed.include_state);
        assert_eq!(parsed.events, "log.txt");

        assert!(Args::try_parse_from(["midi-propagation", "--include-state", "--no-state"]).is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(None), "-");
        assert_eq!(describe(Some(WireEvent::control_change(0, 64, 127))), "B0 40 7F");
    }
}
