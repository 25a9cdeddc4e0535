//! Integration tests for the meteor crate.
//!
//! These run the full pipeline: ntuple file → assembled records → batch.
//! No model or training loop is involved.

use std::path::{Path, PathBuf};

use burn::backend::ndarray::NdArray;
use burn::prelude::*;
use meteor::mocks::MockSource;
use meteor::{
    collate, AffineNormalizer, BranchNames, CandidateLimit, DatasetConfig, MeteorDataset,
    MeteorError, Normalizer, Record, SelectionMode, UniformWeighter, WeightingConfig,
};
use ntuple::{Column, EventColumns, NtupleWriter, ParquetEventReader};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

type TestBackend = NdArray<f32>;

struct Event {
    pt: Vec<f32>,
    eta: Vec<f32>,
    phi: Vec<f32>,
    pdg: Vec<i32>,
    charge: Vec<i32>,
    gen_pt: f32,
    gen_phi: f32,
}

fn columns(events: &[Event]) -> Vec<(String, Column)> {
    let b = BranchNames::default();
    vec![
        (b.candidate_pt, Column::FloatList(events.iter().map(|e| e.pt.clone()).collect())),
        (b.candidate_eta, Column::FloatList(events.iter().map(|e| e.eta.clone()).collect())),
        (b.candidate_phi, Column::FloatList(events.iter().map(|e| e.phi.clone()).collect())),
        (
            b.candidate_puppi_weight,
            Column::FloatList(events.iter().map(|e| vec![1.0; e.pt.len()]).collect()),
        ),
        (b.candidate_pdg_id, Column::IntList(events.iter().map(|e| e.pdg.clone()).collect())),
        (b.candidate_charge, Column::IntList(events.iter().map(|e| e.charge.clone()).collect())),
        (b.gen_met_pt, Column::Float(events.iter().map(|e| e.gen_pt).collect())),
        (b.gen_met_phi, Column::Float(events.iter().map(|e| e.gen_phi).collect())),
    ]
}

fn write_events(path: &Path, events: &[Event]) {
    let mut writer = NtupleWriter::new(path);
    for (name, column) in columns(events) {
        writer.push_column(name, column).unwrap();
    }
    writer.finish().unwrap();
}

fn random_events(rng: &mut StdRng, n: usize) -> Vec<Event> {
    const TYPES: [i32; 8] = [211, -211, 130, 22, 13, -13, 11, -11];
    (0..n)
        .map(|_| {
            let len = rng.gen_range(0..30);
            Event {
                pt: (0..len).map(|_| rng.gen_range(0.0..700.0)).collect(),
                eta: (0..len).map(|_| rng.gen_range(-3.0..3.0)).collect(),
                phi: (0..len).map(|_| rng.gen_range(-3.14..3.14)).collect(),
                pdg: (0..len).map(|_| TYPES[rng.gen_range(0..TYPES.len())]).collect(),
                charge: (0..len).map(|_| rng.gen_range(-1..=1)).collect(),
                gen_pt: rng.gen_range(0.0..300.0),
                gen_phi: rng.gen_range(-3.14..3.14),
            }
        })
        .collect()
}

fn config(mode: SelectionMode, max: Option<usize>) -> DatasetConfig {
    DatasetConfig {
        selection: mode,
        max_candidates: CandidateLimit::from(max),
        ..DatasetConfig::default()
    }
}

fn build(paths: &[PathBuf], cfg: &DatasetConfig) -> meteor::Result<MeteorDataset> {
    MeteorDataset::from_files::<TestBackend, _>(
        &ParquetEventReader::new(),
        paths,
        cfg,
        &UniformWeighter,
        None,
        &Default::default(),
    )
}

/// One event with pt = [5, 50, 600]: the outlier is zeroed, top-2 keeps 50 and 5.
#[test]
fn test_end_to_end_topk_scenario() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.parquet");
    write_events(
        &path,
        &[Event {
            pt: vec![5.0, 50.0, 600.0],
            eta: vec![0.0, 1.0, 2.0],
            phi: vec![0.0, 0.0, 0.0],
            pdg: vec![22, 211, 13],
            charge: vec![0, 1, -1],
            gen_pt: 40.0,
            gen_phi: std::f32::consts::FRAC_PI_2,
        }],
    );

    let ds = build(&[path], &config(SelectionMode::TopK, Some(2))).unwrap();
    assert_eq!(ds.len(), 1);
    let record = &ds.records()[0];

    assert_eq!(record.len(), 2);
    let mut kept: Vec<(f32, f32, u8, u8)> = record
        .candidate_features()
        .iter()
        .zip(record.candidate_type_id())
        .zip(record.candidate_charge_id())
        .map(|((f, &t), &c)| (f[0], f[2], t, c))
        .collect();
    kept.sort_by(|a, b| a.0.total_cmp(&b.0));
    // (px, eta, type id, charge id) of the photon and the charged hadron
    assert_eq!(kept, vec![(5.0, 0.0, 3, 2), (50.0, 1.0, 1, 3)]);

    assert_eq!(record.reference_met(), [-55.0, -0.0]);
    let [tx, ty] = record.target_met();
    assert!(tx.abs() < 1e-4);
    assert!((ty - 40.0).abs() < 1e-4);
}

#[test]
fn test_truncate_and_topk_differ_on_reference_met() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.parquet");
    write_events(
        &path,
        &[Event {
            pt: vec![1.0, 2.0, 30.0, 40.0],
            eta: vec![0.0; 4],
            phi: vec![0.0; 4],
            pdg: vec![211; 4],
            charge: vec![1; 4],
            gen_pt: 10.0,
            gen_phi: 0.0,
        }],
    );

    let truncated = build(&[path.clone()], &config(SelectionMode::Truncate, Some(2))).unwrap();
    let topk = build(&[path], &config(SelectionMode::TopK, Some(2))).unwrap();
    assert_eq!(truncated.records()[0].reference_met()[0], -3.0);
    assert_eq!(topk.records()[0].reference_met()[0], -70.0);
}

#[test]
fn test_files_concatenated_in_order_with_range_and_cut() {
    let tmp = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let first = random_events(&mut rng, 20);
    let second = random_events(&mut rng, 15);
    let a = tmp.path().join("a.parquet");
    let b = tmp.path().join("b.parquet");
    write_events(&a, &first);
    write_events(&b, &second);

    let mut cfg = config(SelectionMode::TopK, Some(8));
    cfg.entry_start = Some(2);
    cfg.entry_stop = Some(12);
    cfg.cut = Some("genMet_pt > 100".into());
    let ds = build(&[a, b], &cfg).unwrap();

    let expected: Vec<f32> = first[2..12]
        .iter()
        .chain(&second[2..12])
        .map(|e| e.gen_pt)
        .filter(|&pt| pt > 100.0)
        .collect();
    let got: Vec<f32> = ds.iter().map(Record::target_met_magnitude).collect();
    assert_eq!(got, expected);
    assert!(ds.iter().all(|r| r.len() <= 8));
}

#[test]
fn test_collation_preserves_lengths_on_random_data() {
    let tmp = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let path = tmp.path().join("events.parquet");
    write_events(&path, &random_events(&mut rng, 40));

    for mode in [SelectionMode::TopK, SelectionMode::Truncate] {
        let ds = build(&[path.clone()], &config(mode, Some(12))).unwrap();
        for chunk in ds.records().chunks(7) {
            let batch = collate::<TestBackend>(chunk, &Default::default());
            let lengths: Vec<i64> = batch
                .candidate_length
                .clone()
                .into_data()
                .convert::<i64>()
                .to_vec()
                .unwrap();
            let expected: Vec<i64> = chunk.iter().map(|r| r.len() as i64).collect();
            assert_eq!(lengths, expected);

            let max_len = batch.max_candidates();
            assert_eq!(max_len, chunk.iter().map(Record::len).max().unwrap());
            let mask: Vec<bool> = batch.candidate_mask.into_data().to_vec().unwrap();
            for (i, record) in chunk.iter().enumerate() {
                let row = &mask[i * max_len..(i + 1) * max_len];
                assert!(row[..record.len()].iter().all(|&m| m));
                assert!(row[record.len()..].iter().all(|&m| !m));
            }
        }
    }
}

#[test]
fn test_topk_never_prefers_zeroed_outlier() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.parquet");
    write_events(
        &path,
        &[Event {
            pt: vec![900.0, 0.5, 3.0, 750.0, 1.0],
            eta: vec![0.0; 5],
            phi: vec![0.0; 5],
            pdg: vec![22; 5],
            charge: vec![0; 5],
            gen_pt: 1.0,
            gen_phi: 0.0,
        }],
    );

    let ds = build(&[path], &config(SelectionMode::TopK, Some(3))).unwrap();
    let mut px: Vec<f32> = ds.records()[0]
        .candidate_features()
        .iter()
        .map(|f| f[0])
        .collect();
    px.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(px, vec![0.5, 1.0, 3.0]);
}

/// A candidate exactly at the threshold is not an outlier.
#[test]
fn test_pt_at_threshold_survives() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.parquet");
    write_events(
        &path,
        &[Event {
            pt: vec![5.0, 50.0, 500.0],
            eta: vec![0.0; 3],
            phi: vec![0.0; 3],
            pdg: vec![211; 3],
            charge: vec![1; 3],
            gen_pt: 40.0,
            gen_phi: 0.0,
        }],
    );

    let ds = build(&[path], &config(SelectionMode::TopK, Some(2))).unwrap();
    let record = &ds.records()[0];
    let mut px: Vec<f32> = record.candidate_features().iter().map(|f| f[0]).collect();
    px.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(px, vec![50.0, 500.0]);
    assert_eq!(record.reference_met(), [-550.0, -0.0]);
}

#[test]
fn test_absent_candidates_masked_at_collation() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.parquet");
    write_events(
        &path,
        &[
            Event {
                pt: vec![1.0, 2.0, 3.0],
                eta: vec![0.0; 3],
                phi: vec![0.0; 3],
                pdg: vec![-999, 211, 22],
                charge: vec![-999, 1, 0],
                gen_pt: 10.0,
                gen_phi: 0.0,
            },
            Event {
                pt: vec![4.0],
                eta: vec![0.0],
                phi: vec![0.0],
                pdg: vec![130],
                charge: vec![0],
                gen_pt: 5.0,
                gen_phi: 0.0,
            },
        ],
    );

    let ds = build(&[path], &config(SelectionMode::Truncate, Some(3))).unwrap();
    assert_eq!(ds.records()[0].len(), 3);
    assert_eq!(ds.records()[0].reference_met(), [-6.0, -0.0]);

    let batch = collate::<TestBackend>(ds.records(), &Default::default());
    let lengths: Vec<i64> = batch
        .candidate_length
        .clone()
        .into_data()
        .convert::<i64>()
        .to_vec()
        .unwrap();
    assert_eq!(lengths, vec![2, 1]);
    let mask: Vec<bool> = batch.candidate_mask.into_data().to_vec().unwrap();
    assert_eq!(mask, vec![false, true, true, true, false, false]);
}

#[test]
fn test_normalized_dataset_keeps_lengths() {
    let mut rng = StdRng::seed_from_u64(5);
    let events = random_events(&mut rng, 25);
    let source = MockSource::new().with_file(
        "mem.parquet",
        EventColumns::from_columns(columns(&events)).unwrap(),
    );
    let cfg = config(SelectionMode::TopK, Some(10));
    let device = Default::default();
    let paths = [PathBuf::from("mem.parquet")];

    let raw = MeteorDataset::from_files::<TestBackend, _>(
        &source,
        &paths,
        &cfg,
        &UniformWeighter,
        None,
        &device,
    )
    .unwrap();
    let norm = AffineNormalizer::fit(raw.records()).unwrap();
    let scaled = MeteorDataset::from_files::<TestBackend, _>(
        &source,
        &paths,
        &cfg,
        &UniformWeighter,
        Some(&norm as &dyn Normalizer<TestBackend>),
        &device,
    )
    .unwrap();

    assert_eq!(raw.len(), scaled.len());
    for (r, s) in raw.iter().zip(&scaled) {
        assert_eq!(r.len(), s.len());
        assert_eq!(r.candidate_type_id(), s.candidate_type_id());
        assert_eq!(r.target_met_magnitude(), s.target_met_magnitude());
    }
}

#[test]
fn test_histogram_weights_mean_one() {
    let mut rng = StdRng::seed_from_u64(9);
    let events = random_events(&mut rng, 50);
    let source = MockSource::new().with_file(
        "mem.parquet",
        EventColumns::from_columns(columns(&events)).unwrap(),
    );
    let cfg = DatasetConfig {
        weighting: WeightingConfig::Histogram {
            low: 0.0,
            high: 300.0,
            bins: 6,
        },
        ..DatasetConfig::default()
    };
    let weighter = cfg.weighting.build().unwrap();
    let ds = MeteorDataset::from_files::<TestBackend, _>(
        &source,
        &[PathBuf::from("mem.parquet")],
        &cfg,
        weighter.as_ref(),
        None,
        &Default::default(),
    )
    .unwrap();
    let summary = ds.summary();
    assert_eq!(summary.events, 50);
    assert!((summary.mean_weight - 1.0).abs() < 1e-4);
}

#[test]
fn test_missing_file_is_source_error() {
    let err = build(
        &[PathBuf::from("/nonexistent/events.parquet")],
        &DatasetConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, MeteorError::Source(_)));
}

#[test]
fn test_invalid_range_rejected_before_reading() {
    let mut cfg = DatasetConfig::default();
    cfg.entry_start = Some(5);
    cfg.entry_stop = Some(1);
    let err = build(&[PathBuf::from("/nonexistent/events.parquet")], &cfg).unwrap_err();
    assert!(matches!(err, MeteorError::Config(_)));
}
