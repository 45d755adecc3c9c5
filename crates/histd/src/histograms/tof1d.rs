//! 1-D time-of-flight histogram

use super::validation::ParamCheck;
use super::{bin_edges, bin_index, AddResult};
use crate::config::HistogramConfig;
use crate::error::ConfigurationError;

/// Bins time-of-flight values over a fixed range.
#[derive(Debug, Clone)]
pub struct TofHistogram {
    topic: String,
    identifier: String,
    source: Option<String>,
    tof_range: (f64, f64),
    num_bins: usize,
    counts: Vec<f64>,
    x_edges: Vec<f64>,
    last_pulse_time: i64,
}

impl TofHistogram {
    pub fn new(cfg: &HistogramConfig) -> Result<Self, ConfigurationError> {
        let mut check = ParamCheck::new("hist1d");
        let tof_range = check.tof_range(cfg.tof_range);
        let num_bins = check.positive(cfg.num_bins, "num_bins");

        match (tof_range, num_bins) {
            (Some(tof_range), Some(num_bins)) => {
                let num_bins = num_bins as usize;
                Ok(Self {
                    topic: cfg.topic.clone(),
                    identifier: cfg.id.clone().unwrap_or_default(),
                    source: super::source_filter(&cfg.source),
                    tof_range,
                    num_bins,
                    counts: vec![0.0; num_bins],
                    x_edges: bin_edges(tof_range.0, tof_range.1, num_bins),
                    last_pulse_time: 0,
                })
            }
            _ => Err(check.into_error()),
        }
    }

    pub fn add_data(
        &mut self,
        pulse_time: i64,
        tofs: &[i32],
        _det_ids: &[i32],
        source: &str,
    ) -> AddResult {
        if let Some(wanted) = &self.source {
            if source != wanted {
                return AddResult::default();
            }
        }
        self.last_pulse_time = pulse_time;

        let mut result = AddResult::default();
        let (lo, hi) = self.tof_range;
        for &tof in tofs {
            match bin_index(tof as f64, lo, hi, self.num_bins) {
                Some(bin) => {
                    self.counts[bin] += 1.0;
                    result.accepted += 1;
                }
                None => result.dropped += 1,
            }
        }
        result
    }

    pub fn clear_data(&mut self) {
        self.counts.fill(0.0);
        self.last_pulse_time = 0;
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn last_pulse_time(&self) -> i64 {
        self.last_pulse_time
    }

    pub fn shape(&self) -> Vec<u32> {
        vec![self.num_bins as u32]
    }

    pub fn data(&self) -> &[f64] {
        &self.counts
    }

    pub fn x_edges(&self) -> &[f64] {
        &self.x_edges
    }
}
