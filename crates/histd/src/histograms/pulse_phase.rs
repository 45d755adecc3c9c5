//! Single-event pulse-phase 1-D histogram
//!
//! Treats each event message as one sample: the pulse time is folded onto
//! the 14 Hz pulse cycle, the phase is corrected against the containing
//! pulse-slot boundary, and the corrected time is binned like a
//! time-of-flight. This is the only kind that runs the optional
//! preprocessor/ROI hooks.

use super::hooks::EventHooks;
use super::validation::ParamCheck;
use super::{bin_edges, bin_index, AddResult};
use crate::config::HistogramConfig;
use crate::error::ConfigurationError;

const PULSE_FREQ: usize = 14;
const NS_PER_SECOND: i64 = 1_000_000_000;

/// Boundaries of the 14 pulse-phase slots within one second, plus the
/// closing edge: `floor(i / 14 * 1e9)` for `i` in `0..=14`.
fn pulse_slot_boundaries() -> [i64; PULSE_FREQ + 1] {
    let mut boundaries = [0i64; PULSE_FREQ + 1];
    for (i, b) in boundaries.iter_mut().enumerate() {
        *b = (i as f64 / PULSE_FREQ as f64 * NS_PER_SECOND as f64).floor() as i64;
    }
    boundaries
}

/// Histograms pulse-phase-corrected event times.
pub struct PulsePhaseHistogram {
    topic: String,
    identifier: String,
    source: Option<String>,
    tof_range: (f64, f64),
    num_bins: usize,
    counts: Vec<f64>,
    x_edges: Vec<f64>,
    pulse_slots: [i64; PULSE_FREQ + 1],
    hooks: EventHooks,
    last_pulse_time: i64,
}

impl PulsePhaseHistogram {
    pub fn new(cfg: &HistogramConfig, hooks: EventHooks) -> Result<Self, ConfigurationError> {
        let mut check = ParamCheck::new("sephist1d");
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
                    pulse_slots: pulse_slot_boundaries(),
                    hooks,
                    last_pulse_time: 0,
                })
            }
            _ => Err(check.into_error()),
        }
    }

    /// Add one event message as a single sample.
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

        // Throw away the seconds part and correct against the slot boundary.
        let phase = pulse_time.rem_euclid(NS_PER_SECOND);
        let slot = self.pulse_slots.partition_point(|b| *b <= phase) - 1;
        let corrected_time = phase - self.pulse_slots[slot];

        // Hooks run after the phase correction: the preprocessor output
        // feeds the ROI check, not the binning of the corrected time.
        let (pulse_time, tofs, det_ids) =
            self.hooks
                .apply_preprocess(pulse_time, tofs.to_vec(), det_ids.to_vec());
        if self.hooks.is_masked(pulse_time, &tofs, &det_ids) {
            return AddResult {
                accepted: 0,
                dropped: 1,
            };
        }

        let (lo, hi) = self.tof_range;
        match bin_index(corrected_time as f64, lo, hi, self.num_bins) {
            Some(bin) => {
                self.counts[bin] += 1.0;
                AddResult {
                    accepted: 1,
                    dropped: 0,
                }
            }
            None => AddResult {
                accepted: 0,
                dropped: 1,
            },
        }
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

impl std::fmt::Debug for PulsePhaseHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulsePhaseHistogram")
            .field("topic", &self.topic)
            .field("num_bins", &self.num_bins)
            .field("tof_range", &self.tof_range)
            .field("hooks", &self.hooks)
            .finish()
    }
}
