//! # FAMS Event Processing Binary
//!
//! Creates the ingress and egress queues, starts the dispatcher and worker
//! pool, and runs until SIGINT or SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! fams_event_processing --config /etc/fams/event_processing.toml
//!
//! # Verbose, JSON logs
//! fams_event_processing -c config/event_processing.toml -v --json
//!
//! # Show the configuration after defaults are applied
//! fams_event_processing -c config/event_processing.toml --print-config
//! ```

#![deny(warnings)]

use clap::Parser;
use fams_common::config::{ConfigLoader, LogLevel};
use fams_common::consts::DEFAULT_CONFIG_PATH;
use fams_event_processing::{AppContext, EventProcessingConfig, EventProcessor, ShutdownHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// FAMS Event Processing - telemetry dispatcher, workers and threshold alerts
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "fams_event_processing")]
#[command(version)]
#[command(about = "Routes sensor frames to category workers, stores samples and raises threshold alerts")]
#[command(long_about = None)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging (overrides shared.log_level)
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("event processing failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = EventProcessingConfig::load(&args.config);
    let level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);
    let config = config?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!(
        "FAMS event processing v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        args.config.display()
    );

    let ctx = Arc::new(AppContext::from_config(config)?);

    let shutdown = ShutdownHandle::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            shutdown.trigger();
        })?;
    }

    let processor = EventProcessor::start(ctx)?;
    while !shutdown.wait_timeout(STATUS_INTERVAL) {
        let ingress = processor.context().queues.ingress();
        debug!(
            pending = ingress.message_count(),
            used_bytes = ingress.used_bytes(),
            "ingress status"
        );
    }

    let report = processor.shutdown()?;
    if let Some(dispatch) = report.dispatcher() {
        info!(
            received = dispatch.received,
            dropped = dispatch.dropped,
            forward_errors = dispatch.forward_errors,
            "dispatch totals"
        );
    }
    info!("FAMS event processing shutdown complete");
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_names(true)
            .init();
    }
}
