//! 2-D time-of-flight x detector-id histogram

use super::validation::ParamCheck;
use super::{bin_edges, bin_index, AddResult};
use crate::config::HistogramConfig;
use crate::error::ConfigurationError;

/// Bins (tof, det_id) pairs on a square grid: `num_bins` bins per axis,
/// tof on x, detector id on y. Storage is row-major `[x, y]`.
#[derive(Debug, Clone)]
pub struct TofDetHistogram {
    topic: String,
    identifier: String,
    source: Option<String>,
    tof_range: (f64, f64),
    det_range: (i64, i64),
    num_bins: usize,
    counts: Vec<f64>,
    x_edges: Vec<f64>,
    y_edges: Vec<f64>,
    last_pulse_time: i64,
}

impl TofDetHistogram {
    pub fn new(cfg: &HistogramConfig) -> Result<Self, ConfigurationError> {
        let mut check = ParamCheck::new("hist2d");
        let tof_range = check.tof_range(cfg.tof_range);
        let det_range = check.det_range(cfg.det_range);
        let num_bins = check.positive(cfg.num_bins, "num_bins");

        match (tof_range, det_range, num_bins) {
            (Some(tof_range), Some(det_range), Some(num_bins)) => {
                let num_bins = num_bins as usize;
                Ok(Self {
                    topic: cfg.topic.clone(),
                    identifier: cfg.id.clone().unwrap_or_default(),
                    source: super::source_filter(&cfg.source),
                    tof_range,
                    det_range,
                    num_bins,
                    counts: vec![0.0; num_bins * num_bins],
                    x_edges: bin_edges(tof_range.0, tof_range.1, num_bins),
                    y_edges: bin_edges(det_range.0 as f64, det_range.1 as f64, num_bins),
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
        det_ids: &[i32],
        source: &str,
    ) -> AddResult {
        if let Some(wanted) = &self.source {
            if source != wanted {
                return AddResult::default();
            }
        }
        self.last_pulse_time = pulse_time;

        let mut result = AddResult::default();
        let (tof_lo, tof_hi) = self.tof_range;
        let (det_lo, det_hi) = self.det_range;
        for (&tof, &det) in tofs.iter().zip(det_ids) {
            let x = bin_index(tof as f64, tof_lo, tof_hi, self.num_bins);
            let y = bin_index(det as f64, det_lo as f64, det_hi as f64, self.num_bins);
            match (x, y) {
                (Some(x), Some(y)) => {
                    self.counts[x * self.num_bins + y] += 1.0;
                    result.accepted += 1;
                }
                _ => result.dropped += 1,
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
        vec![self.num_bins as u32, self.num_bins as u32]
    }

    pub fn data(&self) -> &[f64] {
        &self.counts
    }

    pub fn x_edges(&self) -> &[f64] {
        &self.x_edges
    }

    pub fn y_edges(&self) -> &[f64] {
        &self.y_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistogramKind;

    fn config() -> HistogramConfig {
        HistogramConfig {
            kind: HistogramKind::Hist2d,
            topic: "out".to_string(),
            source: None,
            tof_range: Some((0.0, 100.0)),
            det_range: Some((0, 10)),
            num_bins: Some(10),
            width: None,
            height: None,
            id: None,
        }
    }

    #[test]
    fn test_bins_both_axes_row_major() {
        let mut hist = TofDetHistogram::new(&config()).unwrap();
        // tof 15 -> x bin 1; det 2 -> y bin 2.
        let result = hist.add_data(1, &[15], &[2], "");
        assert_eq!(result.accepted, 1);
        assert_eq!(hist.data()[1 * 10 + 2], 1.0);
    }

    #[test]
    fn test_drops_outside_either_range() {
        let mut hist = TofDetHistogram::new(&config()).unwrap();
        // tof out of range, det out of range, both in range.
        let result = hist.add_data(1, &[200, 15, 15], &[2, 99, 3], "");
        assert_eq!(result.accepted, 1);
        assert_eq!(result.dropped, 2);
        assert_eq!(hist.data().iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_shape_and_edges() {
        let hist = TofDetHistogram::new(&config()).unwrap();
        assert_eq!(hist.shape(), vec![10, 10]);
        assert_eq!(hist.x_edges().len(), 11);
        assert_eq!(hist.y_edges().len(), 11);
        assert_eq!(hist.y_edges()[0], 0.0);
        assert_eq!(hist.y_edges()[10], 10.0);
    }

    #[test]
    fn test_missing_det_range() {
        let mut cfg = config();
        cfg.det_range = None;
        let err = TofDetHistogram::new(&cfg).unwrap_err();
        assert_eq!(err.kind, "hist2d");
        assert_eq!(err.missing, vec!["det_range"]);
    }
}
