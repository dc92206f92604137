use std::path::PathBuf;

use drug_classifier::config::PipelineConfig;
use drug_classifier::input;
use drug_classifier::pipeline;
use drug_classifier::profiler;
use drug_classifier::report::{self, OutputFormat};
use drug_classifier::splitter::SplitStrategy;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_DATA: &str = "data/patients.csv";

#[derive(Parser, Debug)]
#[command(
    name = "drug-classifier",
    about = "Train and compare drug prescription classifiers on patient records",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean, split, balance, train every configured model and report metrics
    Run {
        /// Patient CSV with header Age,Sex,BP,Cholesterol,Na_to_K,Drug
        #[arg(long, default_value = DEFAULT_DATA)]
        data: PathBuf,
        /// YAML pipeline file (seed, split, balancing, models)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the split and undersampling seed
        #[arg(long)]
        seed: Option<u64>,
        /// Override the held-out fraction
        #[arg(long)]
        test_ratio: Option<f64>,
        /// Train on the raw training split
        #[arg(long, default_value_t = false)]
        no_balance: bool,
        /// Preserve class proportions in the split
        #[arg(long, default_value_t = false)]
        stratify: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print a descriptive profile of a patient CSV
    Inspect {
        #[arg(long, default_value = DEFAULT_DATA)]
        data: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Directives used when `RUST_LOG` is unset: `-v` raises this crate's level,
/// dependencies stay at `warn`.
fn default_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("warn,{}={level}", env!("CARGO_CRATE_NAME"))
}

fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity > 0)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Run {
            data,
            config,
            seed,
            test_ratio,
            no_balance,
            stratify,
            format,
        } => {
            let mut pipeline_config = match &config {
                Some(path) => PipelineConfig::from_yaml_file(path)?,
                None => PipelineConfig::default(),
            };
            if let Some(seed) = seed {
                pipeline_config.seed = seed;
            }
            if let Some(ratio) = test_ratio {
                pipeline_config.test_ratio = ratio;
            }
            if no_balance {
                pipeline_config.balance = false;
            }
            if stratify {
                pipeline_config.split = SplitStrategy::Stratified;
            }
            info!(data = %data.display(), ?config, ?format, "starting run");

            let dataset = input::load_dataset(&data)
                .with_context(|| format!("failed to load dataset from {}", data.display()))?;
            let outcome = pipeline::run_pipeline(&dataset, &pipeline_config)
                .context("pipeline aborted")?;

            match format {
                OutputFormat::Text => print!("{}", report::render_outcome(&outcome)),
                OutputFormat::Json => println!("{}", report::to_json(&outcome)?),
            }

            let failed = outcome.models.iter().filter(|m| m.report().is_none()).count();
            if failed > 0 {
                warn!(failed, "some models failed; see report");
            }
            info!(
                models = outcome.models.len(),
                failed,
                "run completed"
            );
        }
        Commands::Inspect { data, format } => {
            let dataset = input::load_dataset(&data)
                .with_context(|| format!("failed to load dataset from {}", data.display()))?;
            let profile = profiler::profile_dataset(&dataset)?;
            match format {
                OutputFormat::Text => print!("{}", report::render_profile(&profile)),
                OutputFormat::Json => println!("{}", report::to_json(&profile)?),
            }
        }
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
