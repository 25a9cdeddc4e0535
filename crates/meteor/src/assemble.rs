//! Per-event record assembly from raw candidate columns.

use burn::prelude::*;
use ntuple::{EventColumns, FieldSpec};

use crate::config::DatasetConfig;
use crate::coords::polar_to_cartesian;
use crate::encoding::{
    Charge, EncodingError, ParticleType, ABSENT_CODE, CONT_NUM_FEATURES, TARGET_NUM_FEATURES,
};
use crate::error::{MeteorError, Result};
use crate::filter::remove_pt_outliers;
use crate::normalize::{transform_ragged, transform_ragged_rows, transform_rows, Normalizer};
use crate::record::{Record, RecordParts};
use crate::select::select_candidates;
use crate::weighting::EventWeighter;

/// Turns the columns of one source file into records.
///
/// Per event: zero pt outliers, select at most `max_candidates` by source
/// position, convert to Cartesian, encode categorical codes and derive the
/// targets. Absent (`-999`) candidates take part in selection like any other
/// and encode to the padding id. Weights and the optional normalization are then
/// applied across all events of the file at once.
pub struct EventAssembler<'a, B: Backend> {
    config: &'a DatasetConfig,
    weighter: &'a dyn EventWeighter,
    normalizer: Option<&'a dyn Normalizer<B>>,
    device: B::Device,
}

#[derive(Default)]
struct Columns {
    features: Vec<Vec<[f32; CONT_NUM_FEATURES]>>,
    type_ids: Vec<Vec<u8>>,
    charge_ids: Vec<Vec<u8>>,
    px_py: Vec<Vec<[f32; TARGET_NUM_FEATURES]>>,
    target_met: Vec<[f32; TARGET_NUM_FEATURES]>,
    target_met_magnitude: Vec<f32>,
    reference_met: Vec<[f32; TARGET_NUM_FEATURES]>,
}

impl<'a, B: Backend> EventAssembler<'a, B> {
    pub fn new(
        config: &'a DatasetConfig,
        weighter: &'a dyn EventWeighter,
        device: B::Device,
    ) -> Self {
        Self {
            config,
            weighter,
            normalizer: None,
            device,
        }
    }

    pub fn with_normalizer(mut self, normalizer: &'a dyn Normalizer<B>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn config(&self) -> &DatasetConfig {
        self.config
    }

    /// Columns to request from the event source.
    pub fn fields(&self) -> Vec<FieldSpec> {
        let b = &self.config.branches;
        vec![
            FieldSpec::float_list(&b.candidate_pt),
            FieldSpec::float_list(&b.candidate_eta),
            FieldSpec::float_list(&b.candidate_phi),
            FieldSpec::float_list(&b.candidate_puppi_weight),
            FieldSpec::int_list(&b.candidate_pdg_id),
            FieldSpec::int_list(&b.candidate_charge),
            FieldSpec::float(&b.gen_met_pt),
            FieldSpec::float(&b.gen_met_phi),
        ]
    }

    /// Build one record per event, in event order.
    pub fn assemble(&self, mut events: EventColumns) -> Result<Vec<Record>> {
        let b = &self.config.branches;
        let limit = self.config.max_candidates.get();

        let mut zeroed = 0;
        for pt in events.float_list_mut(&b.candidate_pt)? {
            zeroed += remove_pt_outliers(pt, self.config.pt_threshold);
        }

        let pt = events.float_list(&b.candidate_pt)?;
        let eta = events.float_list(&b.candidate_eta)?;
        let phi = events.float_list(&b.candidate_phi)?;
        let puppi_weight = events.float_list(&b.candidate_puppi_weight)?;
        let pdg_id = events.int_list(&b.candidate_pdg_id)?;
        let charge = events.int_list(&b.candidate_charge)?;
        let gen_met_pt = events.float(&b.gen_met_pt)?;
        let gen_met_phi = events.float(&b.gen_met_phi)?;

        let num_events = events.num_events();
        let mut cols = Columns::default();
        let mut absent = 0;
        let mut over_limit = 0;

        for event in 0..num_events {
            let len = pt[event].len();
            let lengths = [
                (&b.candidate_eta, eta[event].len()),
                (&b.candidate_phi, phi[event].len()),
                (&b.candidate_puppi_weight, puppi_weight[event].len()),
                (&b.candidate_pdg_id, pdg_id[event].len()),
                (&b.candidate_charge, charge[event].len()),
            ];
            for (name, found) in lengths {
                if found != len {
                    return Err(MeteorError::RaggedMismatch {
                        field: format!("{name}[{event}]"),
                        expected: len,
                        found,
                    });
                }
            }

            let selection = select_candidates(&pt[event], limit, self.config.selection);
            over_limit += selection.source_len() - selection.len();

            let ev_pt = selection.apply(&b.candidate_pt, &pt[event])?;
            let ev_eta = selection.apply(&b.candidate_eta, &eta[event])?;
            let ev_phi = selection.apply(&b.candidate_phi, &phi[event])?;
            let ev_weight = selection.apply(&b.candidate_puppi_weight, &puppi_weight[event])?;
            let ev_pdg = selection.apply(&b.candidate_pdg_id, &pdg_id[event])?;
            let ev_charge = selection.apply(&b.candidate_charge, &charge[event])?;
            absent += ev_pdg.iter().filter(|&&c| c == ABSENT_CODE).count();

            let px_py: Vec<[f32; TARGET_NUM_FEATURES]> = ev_pt
                .iter()
                .zip(&ev_phi)
                .map(|(&r, &p)| polar_to_cartesian(r, p))
                .collect();
            let features = px_py
                .iter()
                .zip(&ev_eta)
                .zip(&ev_weight)
                .map(|((xy, &e), &w)| [xy[0], xy[1], e, w])
                .collect();
            let type_ids = ev_pdg
                .iter()
                .map(|&c| ParticleType::from_raw(c).map(ParticleType::embedding_index))
                .collect::<std::result::Result<Vec<u8>, EncodingError>>()?;
            let charge_ids = ev_charge
                .iter()
                .map(|&c| Charge::from_raw(c).map(Charge::embedding_index))
                .collect::<std::result::Result<Vec<u8>, EncodingError>>()?;

            let (sum_x, sum_y) = px_py
                .iter()
                .fold((0.0_f32, 0.0_f32), |(x, y), v| (x + v[0], y + v[1]));

            cols.features.push(features);
            cols.type_ids.push(type_ids);
            cols.charge_ids.push(charge_ids);
            cols.px_py.push(px_py);
            cols.target_met
                .push(polar_to_cartesian(gen_met_pt[event], gen_met_phi[event]));
            cols.target_met_magnitude.push(gen_met_pt[event]);
            cols.reference_met.push([-sum_x, -sum_y]);
        }

        if absent > 0 {
            tracing::warn!(
                absent,
                events = num_events,
                "Selected absent candidates, encoded as padding"
            );
        }
        tracing::debug!(
            events = num_events,
            zeroed,
            over_limit,
            mode = %self.config.selection,
            "Selected candidates"
        );

        let weights = self.weighter.weight(&cols.target_met_magnitude);
        if weights.len() != num_events {
            return Err(MeteorError::WeightLength {
                expected: num_events,
                found: weights.len(),
            });
        }

        if let Some(normalizer) = self.normalizer {
            self.normalize(normalizer, &mut cols)?;
        }

        let Columns {
            features,
            type_ids,
            charge_ids,
            px_py,
            target_met,
            target_met_magnitude,
            reference_met,
        } = cols;

        let mut records = Vec::with_capacity(num_events);
        let per_event = features
            .into_iter()
            .zip(type_ids)
            .zip(charge_ids)
            .zip(px_py)
            .zip(target_met)
            .zip(target_met_magnitude)
            .zip(reference_met)
            .zip(weights);
        for (
            ((((((features, type_ids), charge_ids), px_py), target), magnitude), reference),
            weight,
        ) in per_event
        {
            records.push(Record::new(RecordParts {
                candidate_features: features,
                candidate_type_id: type_ids,
                candidate_charge_id: charge_ids,
                raw_candidate_px_py: px_py,
                target_met: target,
                target_met_magnitude: magnitude,
                reference_met: reference,
                weight,
            })?);
        }
        Ok(records)
    }

    fn normalize(&self, normalizer: &dyn Normalizer<B>, cols: &mut Columns) -> Result<()> {
        let device = &self.device;
        cols.features = transform_ragged::<B, CONT_NUM_FEATURES, _>(&cols.features, device, |t| {
            normalizer.transform_candidate_features(t)
        })?;
        cols.target_met =
            transform_rows::<B, TARGET_NUM_FEATURES, _>(&cols.target_met, device, |t| {
                normalizer.transform_met(t)
            })?;
        cols.reference_met =
            transform_rows::<B, TARGET_NUM_FEATURES, _>(&cols.reference_met, device, |t| {
                normalizer.transform_met(t)
            })?;
        cols.px_py = transform_ragged_rows::<B, TARGET_NUM_FEATURES, _>(&cols.px_py, device, |t| {
            normalizer.transform_met(t)
        })?;
        Ok(())
    }
}
