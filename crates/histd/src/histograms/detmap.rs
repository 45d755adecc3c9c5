//! 2-D detector pixel map

use super::validation::ParamCheck;
use super::AddResult;
use crate::config::HistogramConfig;
use crate::error::ConfigurationError;

/// Maps sequential 1-based detector ids onto a width x height pixel grid.
///
/// Pixel layout: `x = (id - 1) mod width`, `y = ((id - 1) div width) mod
/// height`. The configured `det_range` must cover exactly `width x height`
/// ids so the mapping is bijective. A `tof_range` is accepted for parameter
/// symmetry with the other kinds but is not used for binning.
#[derive(Debug, Clone)]
pub struct DetMapHistogram {
    topic: String,
    identifier: String,
    source: Option<String>,
    det_range: (i64, i64),
    width: usize,
    height: usize,
    counts: Vec<f64>,
    x_edges: Vec<f64>,
    y_edges: Vec<f64>,
    last_pulse_time: i64,
}

impl DetMapHistogram {
    pub fn new(cfg: &HistogramConfig) -> Result<Self, ConfigurationError> {
        let mut check = ParamCheck::new("dethist");
        if let Some(range) = cfg.tof_range {
            // Unused for binning, but a malformed value is still a config bug.
            check.tof_range(Some(range));
        }
        let det_range = check.det_range(cfg.det_range);
        let width = check.positive(cfg.width, "width");
        let height = check.positive(cfg.height, "height");

        // The number of bins is the number of detectors, and it must tile
        // the grid exactly.
        if let (Some((lo, hi)), Some(w), Some(h)) = (det_range, width, height) {
            if hi - lo + 1 != (w as i64) * (h as i64) {
                check.mark_invalid("det_range");
            }
        }

        match (det_range, width, height) {
            (Some(det_range), Some(width), Some(height)) if check.is_clean() => {
                let (width, height) = (width as usize, height as usize);
                Ok(Self {
                    topic: cfg.topic.clone(),
                    identifier: cfg.id.clone().unwrap_or_default(),
                    source: super::source_filter(&cfg.source),
                    det_range,
                    width,
                    height,
                    counts: vec![0.0; width * height],
                    x_edges: (0..=width).map(|i| i as f64).collect(),
                    y_edges: (0..=height).map(|i| i as f64).collect(),
                    last_pulse_time: 0,
                })
            }
            _ => Err(check.into_error()),
        }
    }

    pub fn add_data(
        &mut self,
        pulse_time: i64,
        _tofs: &[i32],
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
        let (lo, hi) = self.det_range;
        for &id in det_ids {
            let id = id as i64;
            if id <= 0 || id < lo || id > hi {
                result.dropped += 1;
                continue;
            }
            let x = ((id - 1) as usize) % self.width;
            let y = (((id - 1) as usize) / self.width) % self.height;
            self.counts[x * self.height + y] += 1.0;
            result.accepted += 1;
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
        vec![self.width as u32, self.height as u32]
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

    /// Count at pixel `(x, y)`.
    #[cfg(test)]
    fn at(&self, x: usize, y: usize) -> f64 {
        self.counts[x * self.height + y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistogramKind;
    use proptest::prelude::*;

    fn config(width: u32, height: u32, det_range: (i64, i64)) -> HistogramConfig {
        HistogramConfig {
            kind: HistogramKind::DetHist,
            topic: "out".to_string(),
            source: None,
            tof_range: None,
            det_range: Some(det_range),
            num_bins: None,
            width: Some(width),
            height: Some(height),
            id: None,
        }
    }

    #[test]
    fn test_pixel_mapping_scenario() {
        // 4x4 grid, ids 1..=16: ids 1, 2, 5, 16 hit (0,0), (1,0), (0,1),
        // (3,3); 0 and 17 are outside the range.
        let mut hist = DetMapHistogram::new(&config(4, 4, (1, 16))).unwrap();
        let det_ids = [1, 2, 5, 16, 0, 17];
        let result = hist.add_data(1, &[0; 6], &det_ids, "");

        assert_eq!(result.accepted, 4);
        assert_eq!(result.dropped, 2);
        assert_eq!(hist.at(0, 0), 1.0);
        assert_eq!(hist.at(1, 0), 1.0);
        assert_eq!(hist.at(0, 1), 1.0);
        assert_eq!(hist.at(3, 3), 1.0);
        assert_eq!(hist.data().iter().sum::<f64>(), 4.0);
    }

    #[test]
    fn test_range_must_tile_grid() {
        let err = DetMapHistogram::new(&config(4, 4, (1, 15))).unwrap_err();
        assert_eq!(err.kind, "dethist");
        assert_eq!(err.invalid, vec!["det_range"]);
    }

    #[test]
    fn test_bad_tof_range_still_reported() {
        let mut cfg = config(4, 4, (1, 16));
        cfg.tof_range = Some((10.0, 5.0));
        let err = DetMapHistogram::new(&cfg).unwrap_err();
        assert_eq!(err.invalid, vec!["tof_range"]);
    }

    #[test]
    fn test_edges_are_grid_coordinates() {
        let hist = DetMapHistogram::new(&config(4, 2, (1, 8))).unwrap();
        assert_eq!(hist.shape(), vec![4, 2]);
        assert_eq!(hist.x_edges(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist.y_edges(), &[0.0, 1.0, 2.0]);
    }

    proptest! {
        #[test]
        fn prop_full_range_is_bijective(
            width in 1usize..12,
            height in 1usize..12,
        ) {
            // Every id in the full range is accepted, each at a distinct pixel.
            let mut hist = DetMapHistogram::new(&config(
                width as u32,
                height as u32,
                (1, (width * height) as i64),
            )).unwrap();

            let ids: Vec<i32> = (1..=(width * height) as i32).collect();
            let tofs = vec![0; ids.len()];
            let result = hist.add_data(1, &tofs, &ids, "");

            prop_assert_eq!(result.dropped, 0);
            prop_assert_eq!(result.accepted, ids.len() as u64);
            prop_assert!(hist.data().iter().all(|&c| c == 1.0));
        }
    }
}
