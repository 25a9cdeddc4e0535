//! Dataset construction and reporting for the CLI subcommands.

use std::path::PathBuf;
use std::time::Instant;

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use indicatif::{ProgressBar, ProgressStyle};
use meteor::{try_collate, AffineNormalizer, DatasetConfig, EventAssembler, MeteorDataset};
use ntuple::ParquetEventReader;

use crate::config::{build_dataset_config, DatasetOverrides};
use crate::summary::{print_batch, print_summary, BatchReport};

pub type CliBackend = NdArray<f32>;

/// Inputs shared by every subcommand that builds a dataset.
#[derive(Debug)]
pub struct DatasetArgs {
    /// Optional dataset config TOML file.
    pub config: Option<PathBuf>,
    /// Source ntuple files, read in order.
    pub inputs: Vec<PathBuf>,
    pub overrides: DatasetOverrides,
}

/// Arguments for the `summary` subcommand.
#[derive(Debug)]
pub struct SummaryArgs {
    pub dataset: DatasetArgs,
    pub json: bool,
}

/// Arguments for the `batch` subcommand.
#[derive(Debug)]
pub struct BatchArgs {
    pub dataset: DatasetArgs,
    /// Records per batch.
    pub batch_size: usize,
    /// Which batch to collate, counting from zero.
    pub index: usize,
    pub json: bool,
}

/// Arguments for the `fit-normalizer` subcommand.
#[derive(Debug)]
pub struct FitArgs {
    pub dataset: DatasetArgs,
    /// Where to write the normalizer JSON.
    pub output: PathBuf,
}

/// Build a dataset and print its statistics.
pub fn run_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let (config, dataset) = build_dataset(&args.dataset, true)?;
    let summary = dataset.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&config, &args.dataset.inputs, &summary);
        println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());
    }
    Ok(())
}

/// Build a dataset, collate one batch and print its tensor shapes.
pub fn run_batch(args: BatchArgs) -> anyhow::Result<()> {
    if args.batch_size == 0 {
        anyhow::bail!("--batch-size must be at least 1");
    }
    let (_, dataset) = build_dataset(&args.dataset, true)?;

    let Some(first) = args.index.checked_mul(args.batch_size) else {
        anyhow::bail!(
            "batch {} with {} records per batch is past any addressable record",
            args.index,
            args.batch_size
        );
    };
    if first >= dataset.len() {
        anyhow::bail!(
            "batch {} is out of range: dataset has {} records ({} per batch)",
            args.index,
            dataset.len(),
            args.batch_size
        );
    }
    let last = first.saturating_add(args.batch_size).min(dataset.len());
    let records = &dataset.records()[first..last];

    let device = NdArrayDevice::default();
    let batch = try_collate::<CliBackend>(records, &device)?;
    let candidate_length: Vec<i64> = batch
        .candidate_length
        .clone()
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| anyhow::anyhow!("failed to read candidate lengths: {e:?}"))?;

    let report = BatchReport {
        batch: args.index,
        records: batch.len(),
        max_candidates: batch.max_candidates(),
        shapes: batch.shapes(),
        candidate_length,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_batch(&report);
    }
    Ok(())
}

/// Fit an affine normalizer on un-normalized records and save it as JSON.
pub fn run_fit_normalizer(args: FitArgs) -> anyhow::Result<()> {
    let (_, dataset) = build_dataset(&args.dataset, false)?;
    let normalizer = AffineNormalizer::fit(dataset.records())?;
    normalizer.save(&args.output)?;

    println!("--- Normalizer ---");
    println!("Records: {}", dataset.len());
    println!("Candidate shift: {:?}", normalizer.candidate_shift);
    println!("Candidate scale: {:?}", normalizer.candidate_scale);
    println!("MET shift: {:?}", normalizer.met_shift);
    println!("MET scale: {:?}", normalizer.met_scale);
    println!("Output: {}", args.output.display());
    Ok(())
}

/// Read every input file with a progress bar and assemble the records.
///
/// With `normalize` false the configured normalizer is ignored.
fn build_dataset(
    args: &DatasetArgs,
    normalize: bool,
) -> anyhow::Result<(DatasetConfig, MeteorDataset)> {
    let config = build_dataset_config(args.config.as_deref(), &args.overrides)?;
    let weighter = config.weighting.build()?;

    let normalizer = match (&config.normalizer, normalize) {
        (Some(path), true) => Some(AffineNormalizer::load(path)?),
        (Some(path), false) => {
            tracing::warn!(path = %path.display(), "Ignoring configured normalizer");
            None
        }
        (None, _) => None,
    };

    let device = NdArrayDevice::default();
    let mut assembler = EventAssembler::<CliBackend>::new(&config, weighter.as_ref(), device);
    if let Some(normalizer) = &normalizer {
        assembler = assembler.with_normalizer(normalizer);
    }

    let reader = ParquetEventReader::new();
    let pb = ProgressBar::new(args.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}",
            )?
            .progress_chars("=> "),
    );

    let mut dataset = MeteorDataset::default();
    for path in &args.inputs {
        pb.set_message(path.display().to_string());
        let part = MeteorDataset::from_file(&reader, path, &assembler)?;
        dataset.extend(part);
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} records", dataset.len()));

    tracing::info!(
        files = args.inputs.len(),
        events = dataset.len(),
        "Built dataset"
    );
    Ok((config, dataset))
}
