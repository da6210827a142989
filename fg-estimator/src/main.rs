//! Market sentiment index CLI.
//!
//! # Usage
//!
//! ```bash
//! # Compute the index and write a chart payload
//! fg-estimator compute --data data/inputs --range 1Y --output fgi.json
//!
//! # Fit calibration weights against a benchmark series
//! fg-estimator calibrate --data data/inputs --model-out models/fgi_model.json
//!
//! # Check the input files
//! fg-estimator validate --data data/inputs
//!
//! # Regime label for a score
//! fg-estimator classify 63.5
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use fg_estimator::composite::AggregationStrategy;
use fg_estimator::data::{InputKey, SeriesLoader};
use fg_estimator::output::{ChartPayload, PayloadOptions, RangePreset};
use fg_estimator::pipeline::{PipelineConfig, SentimentPipeline};
use fg_estimator::regime::RegimeClassifier;
use fg_estimator::validation::SeriesIntegrityValidator;

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "fg-estimator")]
#[command(about = "Market fear & greed index estimator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the index and emit a chart payload
    Compute {
        /// Directory holding one file per input series
        #[arg(short, long, default_value = "data/inputs")]
        data: PathBuf,

        /// Range preset (1M, 3M, 6M, 1Y, 5Y, MAX)
        #[arg(short, long, default_value = "1Y")]
        range: String,

        /// Range end date (YYYY-MM-DD), defaults to the last computed date
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Comma-separated dataset keys
        #[arg(long, default_value = "fgi")]
        include: String,

        /// Include per-date component scores
        #[arg(long)]
        with_components: bool,

        /// Override the configured aggregation strategy (naive, calibrated)
        #[arg(long)]
        strategy: Option<String>,

        /// Output file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit calibration weights against the benchmark series
    Calibrate {
        #[arg(short, long, default_value = "data/inputs")]
        data: PathBuf,

        /// Where to store the fitted model
        #[arg(long, default_value = "models/fgi_model.json")]
        model_out: PathBuf,
    },

    /// Run integrity checks on the input files
    Validate {
        #[arg(short, long, default_value = "data/inputs")]
        data: PathBuf,
    },

    /// Print the regime of a score
    Classify {
        /// Composite score (0-100)
        score: f64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_compute(
    mut config: PipelineConfig,
    data: PathBuf,
    options: PayloadOptions,
    strategy: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    if let Some(name) = strategy {
        config.aggregation.strategy = AggregationStrategy::from_str(&name)
            .with_context(|| format!("Unknown aggregation strategy: {}", name))?;
    }
    let calibrated = config.aggregation.strategy == AggregationStrategy::Calibrated;

    let loader = SeriesLoader::new(&data);
    let inputs = loader
        .load_inputs(calibrated)
        .with_context(|| format!("Failed to load inputs from {}", data.display()))?;
    info!("Loaded {} input series from {}", inputs.len(), data.display());

    let mut pipeline = SentimentPipeline::new(config)?;
    let result = pipeline.run(&inputs);
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }

    let payload = ChartPayload::build(&result, &options)?;
    match output {
        Some(path) => {
            payload
                .write(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote payload to {}", path.display());
        }
        None => println!("{}", payload.to_json()?),
    }
    Ok(())
}

fn cmd_calibrate(config: PipelineConfig, data: PathBuf, model_out: PathBuf) -> Result<()> {
    let inputs = SeriesLoader::new(&data)
        .load_inputs(true)
        .with_context(|| format!("Failed to load inputs from {}", data.display()))?;

    let mut pipeline = SentimentPipeline::new(config)?;
    let report = pipeline.calibrate(&inputs)?;

    println!("{}", SEPARATOR);
    println!(
        "Calibration window: {} to {}",
        report.model.fitted_from, report.model.fitted_to
    );
    println!("{}", SEPARATOR);
    println!("  intercept          {:>10.4}", report.model.intercept);
    for (name, weight) in &report.model.weights {
        println!("  {:<18} {:>10.4}", name, weight);
    }
    println!();
    println!("{}", report.metrics.summary());

    if let Some(parent) = model_out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    report
        .model
        .save(&model_out)
        .with_context(|| format!("Failed to save model to {}", model_out.display()))?;
    println!("\nModel saved to {}", model_out.display());
    Ok(())
}

fn cmd_validate(data: PathBuf) -> Result<()> {
    let inputs = SeriesLoader::new(&data)
        .load_inputs(true)
        .with_context(|| format!("Failed to load inputs from {}", data.display()))?;
    let reports = SeriesIntegrityValidator::new().validate_all(&inputs);

    println!("{}", SEPARATOR);
    println!("Input integrity: {}", data.display());
    println!("{}", SEPARATOR);
    for report in &reports {
        let status = if report.all_passed() { "OK" } else { "FAIL" };
        println!("[{}] {}", status, report.summary());
        for check in report.failed_checks() {
            println!("    {}: {}", check.name, check.message);
            if let Some(details) = &check.details {
                println!("      {}", details);
            }
        }
    }

    let missing: Vec<_> = InputKey::MARKET
        .iter()
        .filter(|k| !inputs.contains(**k))
        .map(|k| k.as_str())
        .collect();
    if !missing.is_empty() {
        println!("\nMissing inputs: {}", missing.join(", "));
    }
    Ok(())
}

fn cmd_classify(config: PipelineConfig, score: f64) {
    let regime = RegimeClassifier::new(config.regime).classify(score);
    println!("{:.2} -> {} ({})", score, regime, regime.description());
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fg_estimator=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Compute {
            data,
            range,
            end_date,
            include,
            with_components,
            strategy,
            output,
        } => {
            let options = PayloadOptions {
                range: RangePreset::from_str(&range)?,
                end_date,
                include: include
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                with_components,
            };
            cmd_compute(config, data, options, strategy, output)?;
        }
        Commands::Calibrate { data, model_out } => {
            cmd_calibrate(config, data, model_out)?;
        }
        Commands::Validate { data } => {
            cmd_validate(data)?;
        }
        Commands::Classify { score } => {
            cmd_classify(config, score);
        }
    }

    Ok(())
}
