//! Histogram aggregators
//!
//! Four binning kernels behind one tagged-variant dispatcher. Each kernel
//! owns its counts exclusively; snapshots copy the state out for
//! serialization. Binning follows the half-open convention: a value equal
//! to the upper range edge is dropped.

pub mod detmap;
pub mod hooks;
pub mod pulse_phase;
pub mod tof1d;
pub mod tof2d;
pub mod validation;

use crate::codec::HistogramSnapshot;
use crate::config::{HistogramConfig, HistogramKind};
use crate::error::ConfigurationError;

pub use detmap::DetMapHistogram;
pub use hooks::{EventHooks, EventPreprocessor, RegionOfInterest};
pub use pulse_phase::PulsePhaseHistogram;
pub use tof1d::TofHistogram;
pub use tof2d::TofDetHistogram;

/// Outcome of feeding one event message to an aggregator.
///
/// Source-filter mismatches produce a zero result: they count neither as
/// accepted nor as dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddResult {
    pub accepted: u64,
    pub dropped: u64,
}

impl AddResult {
    pub fn merge(&mut self, other: AddResult) {
        self.accepted += other.accepted;
        self.dropped += other.dropped;
    }
}

/// Normalize a configured source filter: blank strings mean no filter.
pub(crate) fn source_filter(source: &Option<String>) -> Option<String> {
    source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `num_bins + 1` equally spaced edges spanning `[lo, hi]` exactly.
pub(crate) fn bin_edges(lo: f64, hi: f64, num_bins: usize) -> Vec<f64> {
    (0..=num_bins)
        .map(|i| {
            let t = i as f64 / num_bins as f64;
            lo * (1.0 - t) + hi * t
        })
        .collect()
}

/// Map `value` onto `0..num_bins` over the half-open interval `[lo, hi)`.
pub(crate) fn bin_index(value: f64, lo: f64, hi: f64, num_bins: usize) -> Option<usize> {
    if !(value >= lo && value < hi) {
        return None;
    }
    let idx = ((value - lo) / (hi - lo) * num_bins as f64) as usize;
    // Guard against float rounding at the top edge.
    Some(idx.min(num_bins - 1))
}

/// One histogram aggregator of any kind.
#[derive(Debug)]
pub enum Histogram {
    Tof(TofHistogram),
    TofDet(TofDetHistogram),
    DetMap(DetMapHistogram),
    PulsePhase(PulsePhaseHistogram),
}

impl Histogram {
    /// Construct the aggregator a config describes, validating parameters.
    pub fn from_config(
        cfg: &HistogramConfig,
        hooks: &EventHooks,
    ) -> Result<Self, ConfigurationError> {
        match cfg.kind {
            HistogramKind::Hist1d => TofHistogram::new(cfg).map(Self::Tof),
            HistogramKind::Hist2d => TofDetHistogram::new(cfg).map(Self::TofDet),
            HistogramKind::DetHist => DetMapHistogram::new(cfg).map(Self::DetMap),
            HistogramKind::SepHist1d => {
                PulsePhaseHistogram::new(cfg, hooks.clone()).map(Self::PulsePhase)
            }
        }
    }

    pub fn add_data(
        &mut self,
        pulse_time: i64,
        tofs: &[i32],
        det_ids: &[i32],
        source: &str,
    ) -> AddResult {
        match self {
            Self::Tof(h) => h.add_data(pulse_time, tofs, det_ids, source),
            Self::TofDet(h) => h.add_data(pulse_time, tofs, det_ids, source),
            Self::DetMap(h) => h.add_data(pulse_time, tofs, det_ids, source),
            Self::PulsePhase(h) => h.add_data(pulse_time, tofs, det_ids, source),
        }
    }

    /// Zero the counts and last pulse time, keeping edges and shape.
    pub fn clear_data(&mut self) {
        match self {
            Self::Tof(h) => h.clear_data(),
            Self::TofDet(h) => h.clear_data(),
            Self::DetMap(h) => h.clear_data(),
            Self::PulsePhase(h) => h.clear_data(),
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Self::Tof(h) => h.topic(),
            Self::TofDet(h) => h.topic(),
            Self::DetMap(h) => h.topic(),
            Self::PulsePhase(h) => h.topic(),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Tof(h) => h.identifier(),
            Self::TofDet(h) => h.identifier(),
            Self::DetMap(h) => h.identifier(),
            Self::PulsePhase(h) => h.identifier(),
        }
    }

    pub fn last_pulse_time(&self) -> i64 {
        match self {
            Self::Tof(h) => h.last_pulse_time(),
            Self::TofDet(h) => h.last_pulse_time(),
            Self::DetMap(h) => h.last_pulse_time(),
            Self::PulsePhase(h) => h.last_pulse_time(),
        }
    }

    pub fn shape(&self) -> Vec<u32> {
        match self {
            Self::Tof(h) => h.shape(),
            Self::TofDet(h) => h.shape(),
            Self::DetMap(h) => h.shape(),
            Self::PulsePhase(h) => h.shape(),
        }
    }

    pub fn data(&self) -> &[f64] {
        match self {
            Self::Tof(h) => h.data(),
            Self::TofDet(h) => h.data(),
            Self::DetMap(h) => h.data(),
            Self::PulsePhase(h) => h.data(),
        }
    }

    pub fn x_edges(&self) -> &[f64] {
        match self {
            Self::Tof(h) => h.x_edges(),
            Self::TofDet(h) => h.x_edges(),
            Self::DetMap(h) => h.x_edges(),
            Self::PulsePhase(h) => h.x_edges(),
        }
    }

    pub fn y_edges(&self) -> Option<&[f64]> {
        match self {
            Self::Tof(_) | Self::PulsePhase(_) => None,
            Self::TofDet(h) => Some(h.y_edges()),
            Self::DetMap(h) => Some(h.y_edges()),
        }
    }

    /// Copy the current state out for serialization.
    pub fn snapshot(&self, source_name: &str, info: &str) -> HistogramSnapshot {
        HistogramSnapshot {
            source: source_name.to_string(),
            info: info.to_string(),
            shape: self.shape(),
            x_edges: self.x_edges().to_vec(),
            y_edges: self.y_edges().map(|e| e.to_vec()),
            data: self.data().to_vec(),
        }
    }
}
