//! Per-event training weights derived from the true MET magnitude.

use crate::error::{MeteorError, Result};

/// Maps true MET magnitudes to one weight per event.
///
/// Must return exactly one weight per input; the assembler rejects anything
/// else.
pub trait EventWeighter {
    fn weight(&self, target_met_magnitude: &[f32]) -> Vec<f32>;
}

impl<F> EventWeighter for F
where
    F: Fn(&[f32]) -> Vec<f32>,
{
    fn weight(&self, target_met_magnitude: &[f32]) -> Vec<f32> {
        self(target_met_magnitude)
    }
}

/// Every event weighs 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeighter;

impl EventWeighter for UniformWeighter {
    fn weight(&self, target_met_magnitude: &[f32]) -> Vec<f32> {
        vec![1.0; target_met_magnitude.len()]
    }
}

/// Inverse-frequency weights over a histogram of the MET magnitude.
///
/// Values outside the edges fall into the first or last bin. Weights are
/// scaled so that their mean over the input is 1.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramWeighter {
    edges: Vec<f32>,
}

impl HistogramWeighter {
    /// Build from strictly increasing bin edges (at least two).
    pub fn new(edges: Vec<f32>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(MeteorError::Config(format!(
                "histogram weighting needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        if edges.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(MeteorError::Config(
                "histogram edges must be finite and strictly increasing".into(),
            ));
        }
        Ok(Self { edges })
    }

    /// `bins` equal-width bins spanning `[low, high]`.
    pub fn uniform_bins(low: f32, high: f32, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(MeteorError::Config("histogram needs at least one bin".into()));
        }
        let width = (high - low) / bins as f32;
        let edges = (0..=bins).map(|i| low + width * i as f32).collect();
        Self::new(edges)
    }

    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin index of `value`, clamped into the histogram range.
    pub fn bin(&self, value: f32) -> usize {
        let last = self.num_bins() - 1;
        // partition_point counts the edges <= value
        let above = self.edges.partition_point(|&e| e <= value);
        above.saturating_sub(1).min(last)
    }
}

impl EventWeighter for HistogramWeighter {
    fn weight(&self, target_met_magnitude: &[f32]) -> Vec<f32> {
        if target_met_magnitude.is_empty() {
            return Vec::new();
        }
        let bins: Vec<usize> = target_met_magnitude.iter().map(|&v| self.bin(v)).collect();
        let mut counts = vec![0_usize; self.num_bins()];
        for &b in &bins {
            counts[b] += 1;
        }

        let filled = counts.iter().filter(|&&c| c > 0).count();
        let empty = counts.len() - filled;
        if empty > 0 {
            tracing::warn!(empty, bins = counts.len(), "Histogram weighting has empty bins");
        }

        let total = target_met_magnitude.len() as f32;
        bins.iter()
            .map(|&b| total / (filled as f32 * counts[b] as f32))
            .collect()
    }
}
