//! Event source: bus consumer + ev42 decoding
//!
//! Pull adapter handing decoded event batches up to a worker. Undecodable
//! payloads are logged, counted, and skipped; a bad frame must never stall
//! the stream.

use crate::bus::{BusMessage, MessageConsumer};
use crate::codec::{decode_ev42, EventMessage};
use crate::error::BusError;
use std::time::Duration;
use tracing::warn;

/// Offset positioning chosen at job start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetMode {
    /// Tail the live stream from the current end offsets.
    Latest,
    /// Seek to the earliest offsets at or after the given timestamp (ns).
    FromTimestamp(i64),
}

/// Decoding pull interface over a bus consumer.
pub struct EventSource {
    consumer: Box<dyn MessageConsumer>,
    decode_errors: u64,
}

impl EventSource {
    pub fn new(consumer: Box<dyn MessageConsumer>) -> Self {
        Self {
            consumer,
            decode_errors: 0,
        }
    }

    /// Position the consumer according to `mode`.
    pub async fn position(&mut self, mode: OffsetMode) -> Result<(), BusError> {
        match mode {
            OffsetMode::Latest => self.consumer.assign_latest().await,
            OffsetMode::FromTimestamp(ts) => self.consumer.seek_to_timestamp(ts).await,
        }
    }

    /// Fetch and decode the next batch of event messages.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Vec<EventMessage>, BusError> {
        let batch = self.consumer.poll(timeout).await?;
        Ok(self.decode_batch(batch))
    }

    fn decode_batch(&mut self, batch: Vec<BusMessage>) -> Vec<EventMessage> {
        let mut events = Vec::with_capacity(batch.len());
        for msg in batch {
            match decode_ev42(&msg.payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    self.decode_errors += 1;
                    warn!(
                        partition = msg.partition,
                        offset = msg.offset,
                        "discarding undecodable event frame: {e}"
                    );
                }
            }
        }
        events
    }

    /// Total payloads discarded because they failed to decode.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }
}
