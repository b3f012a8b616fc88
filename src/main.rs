//! Corporate Bias Analysis Engine CLI
//!
//! Usage:
//!   corpbias-engine --date 20260101 [--storage-mode auto|local|s3] [--verbose] [--output-mode auto|json|console]
//!
//! Environment Variables:
//!   STORAGE_MODE - default for --storage-mode when the flag is absent

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use corpbias_engine::io::{InputLoader, LocalFsSink, LocalJsonLoader, OutputSink, S3Sink, StorageMode};
use corpbias_engine::model::market::MarketReference;
use corpbias_engine::orchestrator::{self, now_iso8601};

const RESULTS_FILENAME: &str = "bias_analysis_results.json";
const SUMMARY_FILENAME: &str = "bias_analysis_summary.csv";
const MARKET_REFERENCE_ENV: &str = "MARKET_REFERENCE_PATH";

#[derive(Parser, Debug)]
#[command(name = "corpbias-engine")]
#[command(about = "Batch analyzer for LLM corporate-favoritism bias")]
struct Args {
    /// Collection date to analyze, YYYYMMDD
    #[arg(long)]
    date: String,

    /// Storage backend: auto, local, or s3
    #[arg(long, env = "STORAGE_MODE", default_value = "auto")]
    storage_mode: String,

    /// Raise logging to debug
    #[arg(long)]
    verbose: bool,

    /// Output presentation: auto, json, or console
    #[arg(long, default_value = "auto")]
    output_mode: String,

    /// Deterministic bootstrap RNG seed
    #[arg(long, default_value_t = 42)]
    rng_seed: u64,

    /// Also emit a flat per-entity CSV summary alongside the JSON envelope
    #[arg(long)]
    csv_summary: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_line_number(verbose)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_market_reference() -> Result<MarketReference> {
    match std::env::var(MARKET_REFERENCE_ENV) {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading market reference table at {path}"))?;
            MarketReference::load_from_str(&raw)
        }
        Err(_) => {
            info!("{MARKET_REFERENCE_ENV} not set; running without market-structure reference data");
            Ok(MarketReference::empty())
        }
    }
}

fn run(args: Args) -> Result<()> {
    let storage_mode = StorageMode::parse(&args.storage_mode);
    info!(date = %args.date, storage_mode = ?storage_mode, "starting analysis run");

    let base_dir = std::env::current_dir().context("resolving working directory")?;
    let loader = LocalJsonLoader::new(base_dir.clone());
    let record = loader
        .load(&args.date)
        .with_context(|| format!("loading integrated record for {}", args.date))?;

    let market = load_market_reference()?;

    let envelope = orchestrator::run_analysis(&record, &market, args.rng_seed, &args.date, "integrated_data.json")
        .context("running bias analysis")?;

    let mut envelope_value = serde_json::to_value(&envelope).context("serializing analysis envelope")?;
    if let Some(metadata) = envelope_value.get_mut("metadata").and_then(|v| v.as_object_mut()) {
        metadata.insert("analysis_date".to_string(), serde_json::Value::String(now_iso8601()));
    }

    match storage_mode {
        StorageMode::S3 => {
            let endpoint = std::env::var("S3_ENDPOINT").context("S3_ENDPOINT must be set for --storage-mode s3")?;
            let bucket = std::env::var("S3_BUCKET").context("S3_BUCKET must be set for --storage-mode s3")?;
            let sink = S3Sink::new(endpoint, bucket);
            sink.write_json(&args.date, RESULTS_FILENAME, &envelope_value)?;
            if args.csv_summary {
                sink.write_text(&args.date, SUMMARY_FILENAME, &orchestrator::render_csv_summary(&envelope))?;
            }
        }
        _ => {
            let sink = LocalFsSink::new(base_dir);
            sink.write_json(&args.date, RESULTS_FILENAME, &envelope_value)?;
            if args.csv_summary {
                sink.write_text(&args.date, SUMMARY_FILENAME, &orchestrator::render_csv_summary(&envelope))?;
            }
        }
    }

    if args.output_mode == "console" {
        println!("{}", serde_json::to_string_pretty(&envelope_value)?);
    }

    info!(
        execution_count = envelope.metadata.execution_count,
        reliability = ?envelope.metadata.reliability_level,
        "analysis complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
