//! Message-bus capability contracts and reference transports
//!
//! The daemon never talks to a concrete bus client directly; everything
//! goes through the `MessageConsumer`/`MessageProducer` traits. Two
//! reference transports ship with the crate: an in-process memory broker
//! (`mem://<name>`) used by tests and single-process demos, and an
//! append-only stream-file transport (`file://<dir>`) for offline
//! recording and replay. A production bus client plugs in by implementing
//! the same pair of traits.

pub mod file;
pub mod memory;

use crate::error::BusError;
use async_trait::async_trait;
use std::time::Duration;

pub use file::{FileConsumer, FileProducer};
pub use memory::{MemoryBroker, MemoryConsumer, MemoryProducer};

/// One message as delivered by a bus transport.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub payload: Vec<u8>,
    /// Broker ingestion timestamp in nanoseconds.
    pub timestamp_ns: i64,
    pub partition: i32,
    pub offset: i64,
}

/// Pull capability over a set of subscribed topics.
///
/// Offsets advance only when `poll` hands a batch up; a failed poll leaves
/// the consumer where it was.
#[async_trait]
pub trait MessageConsumer: Send {
    /// Position every partition at its current end offset (live tail).
    async fn assign_latest(&mut self) -> Result<(), BusError>;

    /// Position every partition at the earliest offset whose message
    /// timestamp is at or after `timestamp_ns`.
    async fn seek_to_timestamp(&mut self, timestamp_ns: i64) -> Result<(), BusError>;

    /// Fetch available messages, waiting up to `timeout` for the first.
    async fn poll(&mut self, timeout: Duration) -> Result<Vec<BusMessage>, BusError>;
}

/// Push capability toward a topic.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BusError>;
}

fn split_scheme(broker: &str) -> Option<(&str, &str)> {
    broker.split_once("://")
}

/// Open a consumer over the first resolvable broker address.
pub fn create_consumer(
    brokers: &[String],
    topics: &[String],
) -> Result<Box<dyn MessageConsumer>, BusError> {
    for broker in brokers {
        match split_scheme(broker) {
            Some(("mem", name)) => {
                let broker = MemoryBroker::named(name);
                return Ok(Box::new(MemoryConsumer::new(broker, topics)));
            }
            Some(("file", dir)) => {
                return Ok(Box::new(FileConsumer::new(dir, topics)));
            }
            _ => continue,
        }
    }
    Err(BusError::Unavailable(format!(
        "no transport for brokers {brokers:?}"
    )))
}

/// Open a producer over the first resolvable broker address.
pub fn create_producer(brokers: &[String]) -> Result<Box<dyn MessageProducer>, BusError> {
    for broker in brokers {
        match split_scheme(broker) {
            Some(("mem", name)) => {
                return Ok(Box::new(MemoryProducer::new(MemoryBroker::named(name))));
            }
            Some(("file", dir)) => {
                return Ok(Box::new(FileProducer::new(dir)));
            }
            _ => continue,
        }
    }
    Err(BusError::Unavailable(format!(
        "no transport for brokers {brokers:?}"
    )))
}

/// Exponential retry backoff for transient bus errors: 100 ms doubling to
/// a 5 s cap.
#[derive(Debug)]
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub const INITIAL: Duration = Duration::from_millis(100);
    pub const MAX: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self {
            current: Self::INITIAL,
        }
    }

    /// Delay to sleep before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Self::MAX);
        delay
    }

    pub fn reset(&mut self) {
        self.current = Self::INITIAL;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time in nanoseconds since the epoch.
pub(crate) fn now_ns() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_scheme_is_unavailable() {
        let brokers = vec!["kafka-1:9092".to_string()];
        assert!(matches!(
            create_consumer(&brokers, &["t".to_string()]),
            Err(BusError::Unavailable(_))
        ));
        assert!(matches!(
            create_producer(&brokers),
            Err(BusError::Unavailable(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Backoff::MAX);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
