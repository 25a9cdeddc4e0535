//! Human-readable reports for dataset and batch summaries.

use std::path::PathBuf;

use meteor::{BatchShapes, DatasetConfig, DatasetSummary};
use serde::Serialize;

/// What `meteor batch` reports about one collated batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch: usize,
    pub records: usize,
    pub max_candidates: usize,
    pub shapes: BatchShapes,
    pub candidate_length: Vec<i64>,
}

pub fn print_summary(config: &DatasetConfig, inputs: &[PathBuf], summary: &DatasetSummary) {
    println!("--- Dataset Summary ---");
    for path in inputs {
        println!("File: {}", path.display());
    }
    let limit = match config.max_candidates.get() {
        Some(n) => n.to_string(),
        None => "unlimited".to_string(),
    };
    println!("Selection: {} (max {limit})", config.selection);
    if let Some(cut) = &config.cut {
        println!("Cut: {cut}");
    }
    println!("Events: {}", summary.events);
    println!("Candidates: {}", summary.candidates);
    println!(
        "Candidates per event: min {}, max {}, mean {:.1}",
        summary.min_candidates, summary.max_candidates, summary.mean_candidates
    );
    println!("Events without candidates: {}", summary.empty_events);
    println!(
        "Mean true MET magnitude: {:.2}",
        summary.mean_target_met_magnitude
    );
    println!("Mean weight: {:.4}", summary.mean_weight);
}

pub fn print_batch(report: &BatchReport) {
    let s = &report.shapes;
    println!("--- Batch {} ---", report.batch);
    println!("Records: {}", report.records);
    println!("Padded length: {}", report.max_candidates);
    println!("candidate_features:   {:?}", s.candidate_features);
    println!("candidate_type_id:    {:?}", s.candidate_type_id);
    println!("candidate_charge_id:  {:?}", s.candidate_charge_id);
    println!("raw_candidate_px_py:  {:?}", s.raw_candidate_px_py);
    println!("candidate_mask:       {:?}", s.candidate_mask);
    println!("candidate_length:     {:?}", s.candidate_length);
    println!("target_met:           {:?}", s.target_met);
    println!("target_met_magnitude: {:?}", s.target_met_magnitude);
    println!("reference_met:        {:?}", s.reference_met);
    println!("weight:               {:?}", s.weight);
    println!("Lengths: {:?}", report.candidate_length);
}
