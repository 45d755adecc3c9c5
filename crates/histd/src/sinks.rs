//! Histogram sink: hs00 encoding + bus producer

use crate::bus::MessageProducer;
use crate::codec::{encode_hs00, HistogramSnapshot};
use crate::error::BusError;

/// Push interface publishing histogram snapshots to their topics.
pub struct HistogramSink {
    producer: Box<dyn MessageProducer>,
}

impl HistogramSink {
    pub fn new(producer: Box<dyn MessageProducer>) -> Self {
        Self { producer }
    }

    /// Encode `snapshot` as an hs00 frame and publish it to `topic`.
    pub async fn publish(
        &self,
        topic: &str,
        snapshot: &HistogramSnapshot,
    ) -> Result<(), BusError> {
        let frame = encode_hs00(snapshot);
        self.producer.publish(topic, &frame).await
    }
}
