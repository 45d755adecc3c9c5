//! In-process memory transport
//!
//! Topic logs held in a shared registry keyed by broker name, so several
//! components in one process can talk through `mem://<name>` addresses.
//! Single partition per topic; offsets are log indices.

use super::{now_ns, BusMessage, MessageConsumer, MessageProducer};
use crate::error::BusError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How often a blocked poll re-checks the topic logs.
const POLL_WAIT_STEP: Duration = Duration::from_millis(20);

static REGISTRY: Lazy<Mutex<HashMap<String, MemoryBroker>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Default)]
struct TopicLog {
    records: Vec<(i64, Arc<Vec<u8>>)>,
}

/// Shared in-process broker: a set of append-only topic logs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    topics: Arc<Mutex<HashMap<String, TopicLog>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the broker registered under `name`.
    pub fn named(name: &str) -> Self {
        let mut registry = REGISTRY.lock().expect("broker registry poisoned");
        registry.entry(name.to_string()).or_default().clone()
    }

    /// Append a payload stamped with the current wall-clock time.
    pub fn publish(&self, topic: &str, payload: &[u8]) {
        self.publish_at(topic, payload, now_ns());
    }

    /// Append a payload with an explicit broker timestamp.
    pub fn publish_at(&self, topic: &str, payload: &[u8], timestamp_ns: i64) {
        let mut topics = self.topics.lock().expect("topic map poisoned");
        topics
            .entry(topic.to_string())
            .or_default()
            .records
            .push((timestamp_ns, Arc::new(payload.to_vec())));
    }

    /// Number of records currently in a topic log.
    pub fn topic_len(&self, topic: &str) -> usize {
        let topics = self.topics.lock().expect("topic map poisoned");
        topics.get(topic).map(|log| log.records.len()).unwrap_or(0)
    }

    /// All payloads of a topic, oldest first.
    pub fn topic_payloads(&self, topic: &str) -> Vec<Vec<u8>> {
        let topics = self.topics.lock().expect("topic map poisoned");
        topics
            .get(topic)
            .map(|log| log.records.iter().map(|(_, p)| p.as_ref().clone()).collect())
            .unwrap_or_default()
    }
}

/// Consumer over one memory broker.
#[derive(Debug)]
pub struct MemoryConsumer {
    broker: MemoryBroker,
    positions: HashMap<String, usize>,
}

impl MemoryConsumer {
    pub fn new(broker: MemoryBroker, topics: &[String]) -> Self {
        let positions = topics.iter().map(|t| (t.clone(), 0)).collect();
        Self { broker, positions }
    }

    fn drain(&mut self) -> Vec<BusMessage> {
        let topics = self.broker.topics.lock().expect("topic map poisoned");
        let mut batch = Vec::new();
        for (topic, position) in self.positions.iter_mut() {
            let Some(log) = topics.get(topic) else {
                continue;
            };
            for (i, (ts, payload)) in log.records.iter().enumerate().skip(*position) {
                batch.push(BusMessage {
                    payload: payload.as_ref().clone(),
                    timestamp_ns: *ts,
                    partition: 0,
                    offset: i as i64,
                });
            }
            *position = log.records.len();
        }
        batch
    }
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn assign_latest(&mut self) -> Result<(), BusError> {
        let topics = self.broker.topics.lock().expect("topic map poisoned");
        for (topic, position) in self.positions.iter_mut() {
            *position = topics.get(topic).map(|log| log.records.len()).unwrap_or(0);
        }
        Ok(())
    }

    async fn seek_to_timestamp(&mut self, timestamp_ns: i64) -> Result<(), BusError> {
        let topics = self.broker.topics.lock().expect("topic map poisoned");
        for (topic, position) in self.positions.iter_mut() {
            let Some(log) = topics.get(topic) else {
                *position = 0;
                continue;
            };
            *position = log.records.partition_point(|(ts, _)| *ts < timestamp_ns);
        }
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BusMessage>, BusError> {
        let deadline = Instant::now() + timeout;
        loop {
            let batch = self.drain();
            if !batch.is_empty() {
                return Ok(batch);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            sleep(POLL_WAIT_STEP.min(remaining)).await;
        }
    }
}

/// Producer over one memory broker.
#[derive(Debug, Clone)]
pub struct MemoryProducer {
    broker: MemoryBroker,
}

impl MemoryProducer {
    pub fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MessageProducer for MemoryProducer {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        self.broker.publish(topic, payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_poll_returns_published_messages_in_order() {
        let broker = MemoryBroker::new();
        broker.publish_at("events", b"a", 100);
        broker.publish_at("events", b"b", 200);

        let mut consumer = MemoryConsumer::new(broker, &topics(&["events"]));
        let batch = consumer.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].payload, b"a");
        assert_eq!(batch[0].offset, 0);
        assert_eq!(batch[1].payload, b"b");
        assert_eq!(batch[1].offset, 1);

        // Offsets advanced: nothing left.
        let batch = consumer.poll(Duration::from_millis(10)).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_assign_latest_skips_backlog() {
        let broker = MemoryBroker::new();
        broker.publish_at("events", b"old", 100);

        let mut consumer = MemoryConsumer::new(broker.clone(), &topics(&["events"]));
        consumer.assign_latest().await.unwrap();
        broker.publish_at("events", b"new", 200);

        let batch = consumer.poll(Duration::from_millis(50)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, b"new");
    }

    #[tokio::test]
    async fn test_seek_to_timestamp() {
        let broker = MemoryBroker::new();
        broker.publish_at("events", b"a", 100);
        broker.publish_at("events", b"b", 1000);
        broker.publish_at("events", b"c", 2000);

        let mut consumer = MemoryConsumer::new(broker, &topics(&["events"]));
        consumer.seek_to_timestamp(1000).await.unwrap();
        let batch = consumer.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].payload, b"b");
        assert_eq!(batch[1].payload, b"c");
    }

    #[tokio::test]
    async fn test_poll_times_out_empty() {
        let broker = MemoryBroker::new();
        let mut consumer = MemoryConsumer::new(broker, &topics(&["events"]));
        let start = std::time::Instant::now();
        let batch = consumer.poll(Duration::from_millis(50)).await.unwrap();
        assert!(batch.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_named_brokers_are_shared() {
        let name = format!("shared-{}", uuid::Uuid::new_v4());
        let a = MemoryBroker::named(&name);
        let b = MemoryBroker::named(&name);
        a.publish_at("t", b"x", 1);
        assert_eq!(b.topic_len("t"), 1);
    }
}
