//! Adaptive anomaly detection CLI
//!
//! Streams a labelled CSV series through the detector and reports detection
//! quality.

use adaptive_anomaly::data::load_csv;
use adaptive_anomaly::detector::{
    AdaptiveDetector, CsvSink, DecisionRecord, DecisionSink, StopHandle,
};
use adaptive_anomaly::DetectorConfig;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adaptive_anomaly")]
#[command(about = "Streaming anomaly detection with online-adapted LSTM models")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detector over a CSV file of timestamp,value,is_anomaly rows
    Run {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// JSON configuration; defaults are used for missing fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write every decision to this CSV file
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Weight initialization seed, overrides the configuration
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the default configuration as JSON
    Config,
}

/// Advances the progress bar and forwards to the optional result log
struct ProgressSink<'a> {
    log: Option<CsvSink<File>>,
    bar: &'a ProgressBar,
}

impl DecisionSink for ProgressSink<'_> {
    fn record(&mut self, record: &DecisionRecord) -> adaptive_anomaly::Result<()> {
        self.bar.set_position(record.index + 1);
        if record.is_anomaly {
            self.bar
                .set_message(format!("last anomaly at {}", record.index));
        }
        match &mut self.log {
            Some(log) => log.record(record),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> adaptive_anomaly::Result<()> {
        match &mut self.log {
            Some(log) => log.flush(),
            None => Ok(()),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(data: PathBuf, config: Option<PathBuf>, log: Option<PathBuf>, seed: Option<u64>) -> Result<()> {
    let mut config = match &config {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration: {:?}", path))?,
        None => DetectorConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }

    let points = load_csv(&data).with_context(|| format!("Failed to read data: {:?}", data))?;
    if points.len() <= config.train_size {
        warn!(
            points = points.len(),
            train_size = config.train_size,
            "series is not longer than the warm-up, no decisions will be made"
        );
    }

    let mut detector = AdaptiveDetector::new(config).context("Invalid configuration")?;

    let bar = ProgressBar::new(points.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let log = log
        .as_ref()
        .map(CsvSink::<File>::create)
        .transpose()
        .context("Failed to create result log")?;
    let mut sink = ProgressSink { log, bar: &bar };

    let summary = detector.run(points, &mut sink, &StopHandle::new())?;
    bar.finish_and_clear();

    info!(
        processed = summary.processed,
        decided = summary.decided,
        skipped = summary.skipped,
        anomalies = summary.anomalies,
        "detection finished"
    );

    let metrics = summary.metrics()?;
    println!("Observations: {}", summary.processed);
    println!("Skipped:      {}", summary.skipped);
    println!("Decisions:    {}", summary.decided);
    println!("Anomalies:    {}", summary.anomalies);
    println!("{}", metrics);

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            config,
            log,
            seed,
        } => run(data, config, log, seed),
        Commands::Config => {
            println!("{}", DetectorConfig::default().to_json()?);
            Ok(())
        }
    }
}
