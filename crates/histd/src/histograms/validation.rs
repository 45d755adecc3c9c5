//! Histogram parameter validation
//!
//! Constructors run every check and report all missing/invalid parameter
//! names in one `ConfigurationError`, so a bad config surfaces as a single
//! status record instead of a fix-one-resubmit loop.

use crate::error::ConfigurationError;

/// Collector for parameter problems found during construction.
#[derive(Debug)]
pub struct ParamCheck {
    kind: &'static str,
    missing: Vec<String>,
    invalid: Vec<String>,
}

impl ParamCheck {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            missing: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Require a time-of-flight range: finite, `low < high`.
    pub fn tof_range(&mut self, range: Option<(f64, f64)>) -> Option<(f64, f64)> {
        match range {
            None => {
                self.missing.push("tof_range".to_string());
                None
            }
            Some((lo, hi)) if lo.is_finite() && hi.is_finite() && lo < hi => Some((lo, hi)),
            Some(_) => {
                self.invalid.push("tof_range".to_string());
                None
            }
        }
    }

    /// Require a detector id range: `low <= high`.
    pub fn det_range(&mut self, range: Option<(i64, i64)>) -> Option<(i64, i64)> {
        match range {
            None => {
                self.missing.push("det_range".to_string());
                None
            }
            Some((lo, hi)) if lo <= hi => Some((lo, hi)),
            Some(_) => {
                self.invalid.push("det_range".to_string());
                None
            }
        }
    }

    /// Require a positive integer parameter.
    pub fn positive(&mut self, value: Option<u32>, name: &'static str) -> Option<u32> {
        match value {
            None => {
                self.missing.push(name.to_string());
                None
            }
            Some(v) if v >= 1 => Some(v),
            Some(_) => {
                self.invalid.push(name.to_string());
                None
            }
        }
    }

    /// Record a cross-parameter violation under `name`.
    pub fn mark_invalid(&mut self, name: &'static str) {
        self.invalid.push(name.to_string());
    }

    /// Convert the collected problems into an error.
    ///
    /// Callers reach this only on a failed construction; an empty check
    /// still yields an error naming the kind, which indicates a programming
    /// mistake in the constructor rather than a user mistake.
    pub fn into_error(self) -> ConfigurationError {
        ConfigurationError {
            kind: self.kind.to_string(),
            missing: self.missing,
            invalid: self.invalid,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_missing_and_invalid_together() {
        let mut check = ParamCheck::new("hist2d");
        assert!(check.tof_range(None).is_none());
        assert!(check.det_range(Some((10, 2))).is_none());
        assert!(check.positive(Some(0), "num_bins").is_none());

        let err = check.into_error();
        assert_eq!(err.kind, "hist2d");
        assert_eq!(err.missing, vec!["tof_range"]);
        assert_eq!(err.invalid, vec!["det_range", "num_bins"]);
    }

    #[test]
    fn test_valid_parameters_pass_through() {
        let mut check = ParamCheck::new("hist1d");
        assert_eq!(check.tof_range(Some((0.0, 100.0))), Some((0.0, 100.0)));
        assert_eq!(check.det_range(Some((1, 1))), Some((1, 1)));
        assert_eq!(check.positive(Some(5), "width"), Some(5));
        assert!(check.is_clean());
    }

    #[test]
    fn test_non_finite_tof_range_invalid() {
        let mut check = ParamCheck::new("hist1d");
        assert!(check.tof_range(Some((0.0, f64::INFINITY))).is_none());
        assert!(check.tof_range(Some((f64::NAN, 1.0))).is_none());
        assert!(check.tof_range(Some((5.0, 5.0))).is_none());
        assert_eq!(check.into_error().invalid.len(), 3);
    }
}
