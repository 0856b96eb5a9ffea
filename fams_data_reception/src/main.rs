//! # FAMS Data Reception Binary
//!
//! Reads JSON sensor batches, one per line, and publishes them as frames to
//! the ingress queue of a running event processing daemon.
//!
//! # Usage
//!
//! ```bash
//! fams_data_reception --input batches.ndjson
//!
//! # From stdin, custom queue name
//! cat batches.ndjson | fams_data_reception --queue Test_Ingress -v
//! ```

#![deny(warnings)]

use clap::Parser;
use fams_common::consts::INGRESS_QUEUE_NAME;
use fams_data_reception::Publisher;
use std::fs::File;
use std::io::{BufReader, stdin};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// FAMS Data Reception - publish sensor batches to the event processing daemon
#[derive(Parser, Debug)]
#[command(name = "fams_data_reception")]
#[command(version)]
#[command(about = "Publishes JSON sensor batches as frames on the ingress queue")]
#[command(long_about = None)]
struct Args {
    /// Ingress queue name
    #[arg(short, long, default_value = INGRESS_QUEUE_NAME)]
    queue: String,

    /// NDJSON input file (stdin when omitted)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("data reception failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    let mut publisher = Publisher::open(&args.queue)?;
    let stats = match &args.input {
        Some(path) => {
            info!("Reading batches from {}", path.display());
            publisher.publish_lines(BufReader::new(File::open(path)?))?
        }
        None => publisher.publish_lines(stdin().lock())?,
    };

    info!(
        "Published {} frames ({} bytes), rejected {}",
        stats.published, stats.bytes, stats.rejected
    );
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
