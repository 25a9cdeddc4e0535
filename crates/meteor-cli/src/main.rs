mod config;
mod pipeline;
mod summary;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use meteor::SelectionMode;
use tracing_subscriber::EnvFilter;

use config::DatasetOverrides;
use pipeline::{BatchArgs, DatasetArgs, FitArgs, SummaryArgs};

/// meteor: build MET regression datasets from candidate ntuples.
#[derive(Parser)]
#[command(name = "meteor", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options that select and shape the dataset.
#[derive(Args, Debug)]
struct DatasetOpts {
    /// Path to dataset config TOML file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input ntuple Parquet files, concatenated in the given order.
    #[arg(long, required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,
    /// Override the candidate selection mode (topk or truncate).
    #[arg(long)]
    selection: Option<SelectionMode>,
    /// Override the maximum number of candidates per event.
    #[arg(long)]
    max_candidates: Option<usize>,
    /// Keep every candidate.
    #[arg(long)]
    unlimited: bool,
    /// First event to read from each file.
    #[arg(long)]
    entry_start: Option<usize>,
    /// Stop reading each file before this event.
    #[arg(long)]
    entry_stop: Option<usize>,
    /// Event filter, e.g. "genMet_pt > 10".
    #[arg(long)]
    cut: Option<String>,
    /// Normalizer JSON to apply.
    #[arg(long)]
    normalizer: Option<PathBuf>,
}

impl From<DatasetOpts> for DatasetArgs {
    fn from(opts: DatasetOpts) -> Self {
        DatasetArgs {
            config: opts.config,
            inputs: opts.inputs,
            overrides: DatasetOverrides {
                selection: opts.selection,
                max_candidates: opts.max_candidates,
                unlimited: opts.unlimited,
                entry_start: opts.entry_start,
                entry_stop: opts.entry_stop,
                cut: opts.cut,
                normalizer: opts.normalizer,
            },
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Build a dataset and print per-event statistics.
    Summary {
        #[command(flatten)]
        dataset: DatasetOpts,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// Collate one batch and print its tensor shapes.
    Batch {
        #[command(flatten)]
        dataset: DatasetOpts,
        /// Records per batch.
        #[arg(long, default_value_t = 32)]
        batch_size: usize,
        /// Which batch to collate, counting from zero.
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// Fit an affine normalizer on the dataset and write it as JSON.
    FitNormalizer {
        #[command(flatten)]
        dataset: DatasetOpts,
        /// Output normalizer JSON file.
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Summary { dataset, json } => pipeline::run_summary(SummaryArgs {
            dataset: dataset.into(),
            json,
        }),
        Command::Batch {
            dataset,
            batch_size,
            index,
            json,
        } => pipeline::run_batch(BatchArgs {
            dataset: dataset.into(),
            batch_size,
            index,
            json,
        }),
        Command::FitNormalizer { dataset, output } => pipeline::run_fit_normalizer(FitArgs {
            dataset: dataset.into(),
            output,
        }),
    }
}
