//! Job and control-message configuration
//!
//! Jobs arrive as JSON control envelopes on the config topic. Envelope
//! parsing is deliberately strict about the command tag and lenient about
//! optional fields; histogram parameter validation happens at aggregator
//! construction so every missing/invalid name is reported at once.

use serde::{Deserialize, Serialize};

/// Default topic carrying control envelopes.
pub const DEFAULT_CONFIG_TOPIC: &str = "hist_commands";

/// Default topic carrying statistics/status records.
pub const DEFAULT_STATUS_TOPIC: &str = "hist_status";

/// Histogram kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistogramKind {
    /// 1-D time-of-flight histogram.
    Hist1d,
    /// 2-D time-of-flight x detector-id histogram.
    Hist2d,
    /// 2-D detector pixel map (width x height).
    DetHist,
    /// Single-event pulse-phase 1-D histogram.
    SepHist1d,
}

impl HistogramKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hist1d => "hist1d",
            Self::Hist2d => "hist2d",
            Self::DetHist => "dethist",
            Self::SepHist1d => "sephist1d",
        }
    }
}

/// Configuration for one histogram aggregator.
///
/// Which fields are required depends on `kind`; the aggregator constructors
/// validate and report all missing/invalid parameters together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramConfig {
    #[serde(rename = "type")]
    pub kind: HistogramKind,

    /// Topic the histogram is published to.
    pub topic: String,

    /// Only events from this source are binned when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Time-of-flight range in nanoseconds, `[low, high]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tof_range: Option<(f64, f64)>,

    /// Detector id range, `[low, high]` inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub det_range: Option<(i64, i64)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_bins: Option<u32>,

    /// Detector columns (dethist only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Detector rows (dethist only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Optional identifier echoed in published snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Configuration for one histogramming job (one worker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job identifier; a duplicate id replaces the running job.
    pub id: String,

    /// Brokers for the event topics; daemon brokers are used when empty.
    #[serde(default)]
    pub data_brokers: Vec<String>,

    /// Event topics the job consumes.
    pub data_topics: Vec<String>,

    /// Interval start in nanoseconds. When set, the consumer seeks to the
    /// earliest offsets at or after this time; when absent, the job tails
    /// the live stream and counting starts with the first polled record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    /// Interval end in nanoseconds; open-ended when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,

    /// Written verbatim into the `info` field of published snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,

    pub histograms: Vec<HistogramConfig>,
}

/// Control envelope consumed from the config topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Start a job (replacing any job with the same id).
    Add(JobConfig),
    /// Stop one job, or all jobs when `id` is absent.
    Stop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Zero the counts of one job, or all jobs when `id` is absent.
    Reset {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Stop all jobs and shut the daemon down.
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_envelope() {
        let raw = r#"{
            "cmd": "add",
            "id": "job1",
            "data_brokers": ["mem://test"],
            "data_topics": ["events"],
            "start": 1000,
            "histograms": [{
                "type": "hist1d",
                "tof_range": [20, 2000],
                "num_bins": 50,
                "topic": "topic0",
                "source": "source1"
            }]
        }"#;
        let msg: ControlMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ControlMessage::Add(job) => {
                assert_eq!(job.id, "job1");
                assert_eq!(job.start, Some(1000));
                assert_eq!(job.stop, None);
                assert_eq!(job.histograms.len(), 1);
                let h = &job.histograms[0];
                assert_eq!(h.kind, HistogramKind::Hist1d);
                assert_eq!(h.tof_range, Some((20.0, 2000.0)));
                assert_eq!(h.num_bins, Some(50));
                assert_eq!(h.source.as_deref(), Some("source1"));
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_commands() {
        assert!(matches!(
            serde_json::from_str::<ControlMessage>(r#"{"cmd": "quit"}"#).unwrap(),
            ControlMessage::Quit
        ));
        assert!(matches!(
            serde_json::from_str::<ControlMessage>(r#"{"cmd": "stop", "id": "j"}"#).unwrap(),
            ControlMessage::Stop { id: Some(_) }
        ));
        assert!(matches!(
            serde_json::from_str::<ControlMessage>(r#"{"cmd": "reset"}"#).unwrap(),
            ControlMessage::Reset { id: None }
        ));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<ControlMessage>(r#"{"cmd": "explode"}"#).is_err());
    }

    #[test]
    fn test_kind_names() {
        for (kind, name) in [
            (HistogramKind::Hist1d, "hist1d"),
            (HistogramKind::Hist2d, "hist2d"),
            (HistogramKind::DetHist, "dethist"),
            (HistogramKind::SepHist1d, "sephist1d"),
        ] {
            assert_eq!(kind.as_str(), name);
            let json = format!("\"{name}\"");
            assert_eq!(serde_json::from_str::<HistogramKind>(&json).unwrap(), kind);
        }
    }
}
