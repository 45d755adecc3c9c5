//! Histogrammer: the aggregator set of one job
//!
//! Routes every event message to every aggregator (each applies its own
//! source filter) and publishes hs00 snapshots to the aggregators' topics.
//! Publish failures are logged and the histogram state kept; the next tick
//! retries with fresher counts.

use crate::codec::EventMessage;
use crate::histograms::{AddResult, Histogram};
use crate::sinks::HistogramSink;
use tracing::warn;

/// Snapshot source name written into every published frame.
const SOURCE_NAME: &str = env!("CARGO_PKG_NAME");

pub struct Histogrammer {
    histograms: Vec<Histogram>,
    sink: HistogramSink,
    info: String,
    total_events: u64,
    total_dropped: u64,
}

impl Histogrammer {
    pub fn new(histograms: Vec<Histogram>, sink: HistogramSink, info: Option<String>) -> Self {
        Self {
            histograms,
            sink,
            info: info.unwrap_or_default(),
            total_events: 0,
            total_dropped: 0,
        }
    }

    /// Feed a batch of event messages to every aggregator.
    pub fn add_data(&mut self, records: &[EventMessage]) -> AddResult {
        let mut result = AddResult::default();
        for record in records {
            for hist in &mut self.histograms {
                result.merge(hist.add_data(
                    record.pulse_time,
                    &record.tofs,
                    &record.det_ids,
                    &record.source,
                ));
            }
        }
        self.total_events += result.accepted;
        self.total_dropped += result.dropped;
        result
    }

    /// Publish the current snapshot of every aggregator to its topic.
    pub async fn publish(&self) {
        for hist in &self.histograms {
            let snapshot = hist.snapshot(SOURCE_NAME, &self.info);
            if let Err(e) = self.sink.publish(hist.topic(), &snapshot).await {
                warn!(topic = hist.topic(), "failed to publish histogram: {e}");
            }
        }
    }

    /// Zero all aggregators, keeping their shapes and edges.
    pub fn clear(&mut self) {
        for hist in &mut self.histograms {
            hist.clear_data();
        }
    }

    /// Largest pulse time ingested by any aggregator.
    pub fn last_pulse_time(&self) -> i64 {
        self.histograms
            .iter()
            .map(|h| h.last_pulse_time())
            .max()
            .unwrap_or(0)
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MemoryBroker, MemoryProducer};
    use crate::codec::decode_hs00;
    use crate::config::{HistogramConfig, HistogramKind};
    use crate::histograms::EventHooks;

    fn hist1d(topic: &str, source: Option<&str>) -> Histogram {
        let cfg = HistogramConfig {
            kind: HistogramKind::Hist1d,
            topic: topic.to_string(),
            source: source.map(|s| s.to_string()),
            tof_range: Some((0.0, 100.0)),
            det_range: None,
            num_bins: Some(10),
            width: None,
            height: None,
            id: None,
        };
        Histogram::from_config(&cfg, &EventHooks::default()).unwrap()
    }

    fn record(source: &str, pulse_time: i64, tofs: Vec<i32>) -> EventMessage {
        let det_ids = vec![1; tofs.len()];
        EventMessage {
            source: source.to_string(),
            message_id: 0,
            pulse_time,
            tofs,
            det_ids,
        }
    }

    #[tokio::test]
    async fn test_routes_to_all_aggregators_with_filters() {
        let broker = MemoryBroker::new();
        let sink = HistogramSink::new(Box::new(MemoryProducer::new(broker.clone())));
        let mut histogrammer = Histogrammer::new(
            vec![hist1d("all", None), hist1d("only_a", Some("a"))],
            sink,
            None,
        );

        let result = histogrammer.add_data(&[
            record("a", 10, vec![5]),
            record("b", 20, vec![15]),
        ]);

        // "all" accepts both, "only_a" accepts one.
        assert_eq!(result.accepted, 3);
        assert_eq!(histogrammer.total_events(), 3);
        assert_eq!(histogrammer.last_pulse_time(), 20);
    }

    #[tokio::test]
    async fn test_publish_writes_one_frame_per_aggregator() {
        let broker = MemoryBroker::new();
        let sink = HistogramSink::new(Box::new(MemoryProducer::new(broker.clone())));
        let mut histogrammer = Histogrammer::new(
            vec![hist1d("topic_x", None), hist1d("topic_y", None)],
            sink,
            Some("run 42".to_string()),
        );

        histogrammer.add_data(&[record("a", 10, vec![5, 15])]);
        histogrammer.publish().await;

        for topic in ["topic_x", "topic_y"] {
            let payloads = broker.topic_payloads(topic);
            assert_eq!(payloads.len(), 1);
            let snapshot = decode_hs00(&payloads[0]).unwrap();
            assert_eq!(snapshot.source, "histd");
            assert_eq!(snapshot.info, "run 42");
            assert_eq!(snapshot.data.iter().sum::<f64>(), 2.0);
        }
    }

    #[tokio::test]
    async fn test_clear_zeroes_all() {
        let broker = MemoryBroker::new();
        let sink = HistogramSink::new(Box::new(MemoryProducer::new(broker)));
        let mut histogrammer = Histogrammer::new(vec![hist1d("t", None)], sink, None);

        histogrammer.add_data(&[record("a", 10, vec![5])]);
        histogrammer.clear();
        assert_eq!(histogrammer.last_pulse_time(), 0);
        // Totals are cumulative; only the counts reset.
        assert_eq!(histogrammer.total_events(), 1);
    }
}
