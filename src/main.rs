//! Media Activity Agent CLI
//!
//! Streams `START`/`STOP` tokens to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use media_activity_agent::{
    config::{Config, OutputFormat, SourceConfig},
    core::{ActivityEngine, ActivityEvent, ActivityState, EngineConfig},
    source::{signal_targets, ScriptSource},
    stats::create_shared_log_with_persistence,
    VERSION,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "media-activity")]
#[command(version = VERSION)]
#[command(about = "Normalize platform media signals into a START/STOP stream", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay native signals and stream the normalized events
    Run {
        /// JSON Lines file of native signals (reads stdin if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Signal sources to accept (notification, audio-session, or all)
        #[arg(long)]
        sources: Option<String>,

        /// Output format (token or json)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Show cumulative activity statistics
    Status,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config, using defaults: {e}");
            Config::default()
        }
    };

    init_tracing(cli.verbose, &config.log_level);

    match cli.command {
        Commands::Run {
            input,
            sources,
            format,
        } => cmd_run(config, input, sources, format),
        Commands::Status => cmd_status(&config),
        Commands::Config => cmd_config(&config),
    }
}

fn init_tracing(verbose: bool, default_level: &str) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(
    config: Config,
    input: Option<PathBuf>,
    sources: Option<String>,
    format: Option<OutputFormat>,
) -> Result<()> {
    let source_config = sources
        .as_deref()
        .map(SourceConfig::from_csv)
        .unwrap_or(config.sources);
    if !source_config.any_enabled() {
        bail!("At least one source must be enabled (notification or audio-session)");
    }
    let format = format.unwrap_or(config.output_format);

    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create data directory: {e}");
    }

    let activity_log = create_shared_log_with_persistence(config.stats_path());
    let mut engine = ActivityEngine::start(
        EngineConfig {
            queue_capacity: config.queue_capacity,
        },
        activity_log.clone(),
    )
    .context("Failed to start activity engine")?;

    engine.attach(move |state: ActivityState| write_event(format, state));

    // Must be in place before replay starts.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")?;

    let targets = signal_targets(&engine.sender(), &source_config);
    let mut script = ScriptSource::new(targets);
    match input {
        Some(ref path) => script
            .start_file(path)
            .with_context(|| format!("Could not replay {path:?}"))?,
        None => script
            .start(std::io::BufReader::new(std::io::stdin()))
            .context("Could not read stdin")?,
    }

    tracing::info!(
        notification = source_config.notification,
        audio_session = source_config.audio_session,
        "Listening for media activity"
    );

    while running.load(Ordering::SeqCst) && script.is_running() {
        thread::sleep(Duration::from_millis(100));
    }

    if running.load(Ordering::SeqCst) {
        if let Some(report) = script.wait() {
            tracing::info!(
                forwarded = report.forwarded,
                filtered = report.filtered,
                malformed = report.malformed,
                "Replay finished"
            );
        }
    } else {
        tracing::info!("Interrupted, stopping");
        script.cancel();
    }

    engine.shutdown();

    if let Err(e) = activity_log.save() {
        tracing::warn!("Could not save activity stats: {e}");
    }

    eprintln!();
    eprintln!("{}", activity_log.summary());
    Ok(())
}

/// Write one emission to stdout. A closed stdout is not fatal.
fn write_event(format: OutputFormat, state: ActivityState) {
    let line = match format {
        OutputFormat::Token => state.token().to_string(),
        OutputFormat::Json => match serde_json::to_string(&ActivityEvent::now(state)) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Could not serialize event: {e}");
                return;
            }
        },
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
        tracing::debug!("Could not write event: {e}");
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Media Activity Agent Status");
    println!("===========================");
    println!();

    println!("Configuration:");
    println!(
        "  Notification source: {}",
        if config.sources.notification {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Audio session source: {}",
        if config.sources.audio_session {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Queue capacity: {}", config.queue_capacity);
    println!();

    let stats_path = config.stats_path();
    if !stats_path.exists() {
        println!("No previous session data found.");
        return Ok(());
    }

    let content = std::fs::read_to_string(&stats_path)
        .with_context(|| format!("Could not read {stats_path:?}"))?;
    let stats: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Could not parse {stats_path:?}"))?;

    println!("Cumulative Statistics:");
    for (key, label) in [
        ("notification_observations", "Notification observations"),
        ("audio_session_observations", "Audio session observations"),
        ("dropped_observations", "Dropped observations"),
        ("ignored_observations", "Ignored observations"),
        ("suppressed_observations", "Suppressed observations"),
        ("start_emitted", "START emitted"),
        ("stop_emitted", "STOP emitted"),
    ] {
        if let Some(value) = stats.get(key) {
            println!("  {label}: {value}");
        }
    }
    if let Some(updated) = stats.get("last_updated").and_then(|v| v.as_str()) {
        println!("  Last updated: {updated}");
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).context("Could not serialize config")?
    );
    Ok(())
}
