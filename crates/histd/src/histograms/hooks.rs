//! Optional per-event hooks
//!
//! A job may supply a preprocessor (transforms an event message before
//! binning) and a region-of-interest check (suppresses masked events).
//! Hooks are fallible and isolated: a hook error is logged and the event
//! passes through unchanged (preprocessor) or is treated as unmasked (roi).
//! Hooks run inside the aggregator, never in the worker loop.

use std::sync::Arc;
use tracing::warn;

/// Transforms event data before it is binned.
pub trait EventPreprocessor: Send + Sync {
    fn preprocess(
        &self,
        pulse_time: i64,
        tofs: Vec<i32>,
        det_ids: Vec<i32>,
    ) -> anyhow::Result<(i64, Vec<i32>, Vec<i32>)>;
}

/// Region-of-interest mask; a truthy first element suppresses the event.
pub trait RegionOfInterest: Send + Sync {
    fn mask(&self, pulse_time: i64, tofs: &[i32], det_ids: &[i32]) -> anyhow::Result<Vec<bool>>;
}

/// Hook capability set supplied at worker construction.
#[derive(Clone, Default)]
pub struct EventHooks {
    pub preprocessor: Option<Arc<dyn EventPreprocessor>>,
    pub roi: Option<Arc<dyn RegionOfInterest>>,
}

impl EventHooks {
    /// Run the preprocessor with error isolation.
    pub(crate) fn apply_preprocess(
        &self,
        pulse_time: i64,
        tofs: Vec<i32>,
        det_ids: Vec<i32>,
    ) -> (i64, Vec<i32>, Vec<i32>) {
        let Some(pre) = &self.preprocessor else {
            return (pulse_time, tofs, det_ids);
        };
        match pre.preprocess(pulse_time, tofs.clone(), det_ids.clone()) {
            Ok(transformed) => transformed,
            Err(e) => {
                warn!("exception while preprocessing data, passing event through: {e}");
                (pulse_time, tofs, det_ids)
            }
        }
    }

    /// Run the region-of-interest check with error isolation.
    pub(crate) fn is_masked(&self, pulse_time: i64, tofs: &[i32], det_ids: &[i32]) -> bool {
        let Some(roi) = &self.roi else {
            return false;
        };
        match roi.mask(pulse_time, tofs, det_ids) {
            Ok(mask) => mask.first().copied().unwrap_or(false),
            Err(e) => {
                warn!("exception while checking region of interest, treating as unmasked: {e}");
                false
            }
        }
    }
}

impl std::fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHooks")
            .field("preprocessor", &self.preprocessor.is_some())
            .field("roi", &self.roi.is_some())
            .finish()
    }
}
