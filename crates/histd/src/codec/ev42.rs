//! ev42 event frames
//!
//! One frame per neutron pulse: source name, message id, pulse time in
//! nanoseconds, and parallel time-of-flight / detector-id arrays.

use super::wire::{check_header, FrameReader, FrameWriter};
use crate::error::CodecError;

pub const SCHEMA: &str = "ev42";

/// A decoded event message.
///
/// `tofs` and `det_ids` are parallel arrays: entry `i` of each describes the
/// same detected neutron.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub source: String,
    pub message_id: u64,
    /// Absolute nanosecond timestamp of the neutron pulse.
    pub pulse_time: i64,
    /// Time-of-flight per event, nanoseconds since the pulse.
    pub tofs: Vec<i32>,
    /// 1-based detector pixel id per event.
    pub det_ids: Vec<i32>,
}

/// Encode an event message as an ev42 frame.
pub fn encode_ev42(msg: &EventMessage) -> Vec<u8> {
    let mut w = FrameWriter::new();
    w.put_str(&msg.source);
    w.put_u64(msg.message_id);
    w.put_i64(msg.pulse_time);
    w.put_i32_array(&msg.tofs);
    w.put_i32_array(&msg.det_ids);
    w.finish("ev42")
}

/// Decode an ev42 frame.
pub fn decode_ev42(buf: &[u8]) -> Result<EventMessage, CodecError> {
    check_header(buf, "ev42")?;

    let mut r = FrameReader::body(buf);
    let source = r.get_str()?;
    let message_id = r.get_u64()?;
    let pulse_time = r.get_i64()?;
    let tofs = r.get_i32_array()?;
    let det_ids = r.get_i32_array()?;

    if tofs.len() != det_ids.len() {
        return Err(CodecError::MalformedFrame(format!(
            "tof count {} does not match detector-id count {}",
            tofs.len(),
            det_ids.len()
        )));
    }

    Ok(EventMessage {
        source,
        message_id,
        pulse_time,
        tofs,
        det_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> EventMessage {
        EventMessage {
            source: "freia_detector".to_string(),
            message_id: 17,
            pulse_time: 1_234_567_890_123,
            tofs: vec![5, 15, 25, 95],
            det_ids: vec![1, 2, 5, 16],
        }
    }

    #[test]
    fn test_round_trip() {
        let msg = sample();
        let buf = encode_ev42(&msg);
        assert_eq!(decode_ev42(&buf).unwrap(), msg);
    }

    #[test]
    fn test_schema_tag_at_offset_4() {
        let buf = encode_ev42(&sample());
        assert_eq!(&buf[4..8], b"ev42");
    }

    #[test]
    fn test_wrong_schema_rejected() {
        let mut buf = encode_ev42(&sample());
        buf[4..8].copy_from_slice(b"xyz0");
        assert_eq!(
            decode_ev42(&buf),
            Err(CodecError::SchemaMismatch {
                expected: "ev42",
                found: "xyz0".to_string(),
            })
        );
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let buf = encode_ev42(&sample());
        for cut in [3, 7, 12, buf.len() - 1] {
            assert!(decode_ev42(&buf[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_mismatched_array_lengths_rejected() {
        // Hand-build a frame whose det_ids array is shorter than tofs.
        let mut w = crate::codec::wire::FrameWriter::new();
        w.put_str("s");
        w.put_u64(1);
        w.put_i64(0);
        w.put_i32_array(&[1, 2, 3]);
        w.put_i32_array(&[1]);
        let buf = w.finish("ev42");
        assert!(matches!(
            decode_ev42(&buf),
            Err(CodecError::MalformedFrame(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            source in "[a-z0-9_]{0,24}",
            message_id in any::<u64>(),
            pulse_time in any::<i64>(),
            events in proptest::collection::vec((any::<i32>(), any::<i32>()), 0..64),
        ) {
            let (tofs, det_ids): (Vec<i32>, Vec<i32>) = events.into_iter().unzip();
            let msg = EventMessage { source, message_id, pulse_time, tofs, det_ids };
            let buf = encode_ev42(&msg);
            prop_assert_eq!(&buf[4..8], b"ev42");
            prop_assert_eq!(decode_ev42(&buf).unwrap(), msg);
        }
    }
}
