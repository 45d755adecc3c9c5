//! Worker states and statistics records

use serde::{Deserialize, Serialize};

/// Lifecycle state of a histogramming job.
///
/// The sequence is monotonic: a worker only ever moves forward through
/// `NotStarted -> Counting -> (Finished | Stopped)`. `Error` appears only
/// in status records published by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    NotStarted,
    Counting,
    Finished,
    Stopped,
    Error,
}

impl WorkerState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Stopped | Self::Error)
    }
}

/// One statistics record, published to the status topic as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub job_id: String,
    pub last_pulse_time: i64,
    pub total_events: u64,
    /// Events dropped for falling outside a histogram range, plus event
    /// frames discarded because they failed to decode.
    pub dropped_out_of_range: u64,
    pub state: WorkerState,
    /// Wall-clock emission time, milliseconds since the epoch.
    pub ts: i64,
    /// Machine-readable failure reason; only present on error records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatisticsRecord {
    /// Status record for a job that could not be brought up or was given up on.
    pub fn error(job_id: &str, reason: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            last_pulse_time: 0,
            total_events: 0,
            dropped_out_of_range: 0,
            state: WorkerState::Error,
            ts: chrono::Utc::now().timestamp_millis(),
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serialization_names() {
        for (state, name) in [
            (WorkerState::NotStarted, "\"not_started\""),
            (WorkerState::Counting, "\"counting\""),
            (WorkerState::Finished, "\"finished\""),
            (WorkerState::Stopped, "\"stopped\""),
            (WorkerState::Error, "\"error\""),
        ] {
            assert_eq!(serde_json::to_string(&state).unwrap(), name);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!WorkerState::NotStarted.is_terminal());
        assert!(!WorkerState::Counting.is_terminal());
        assert!(WorkerState::Finished.is_terminal());
        assert!(WorkerState::Stopped.is_terminal());
        assert!(WorkerState::Error.is_terminal());
    }

    #[test]
    fn test_reason_omitted_when_absent() {
        let record = StatisticsRecord {
            job_id: "j".to_string(),
            last_pulse_time: 0,
            total_events: 0,
            dropped_out_of_range: 0,
            state: WorkerState::Counting,
            ts: 0,
            reason: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("reason"));

        let error = StatisticsRecord::error("j", "bad config".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"reason\":\"bad config\""));
        assert!(json.contains("\"state\":\"error\""));
    }
}
