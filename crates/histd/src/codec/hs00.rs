//! hs00 histogram frames
//!
//! Carries one histogram snapshot: source, free-form info string, current
//! shape (rank 1 or 2), per-dimension bin boundary metadata, and the
//! row-major flattened counts. The only array element type on the wire is
//! ArrayDouble.

use super::wire::{check_header, FrameReader, FrameWriter};
use crate::error::CodecError;

pub const SCHEMA: &str = "hs00";

/// Wire tag for double-precision arrays, the only permitted element type.
pub const ARRAY_DOUBLE: u8 = 1;

/// A histogram snapshot, the unit of publication.
///
/// `data` is row-major: for a 2-D histogram of shape `[nx, ny]`, entry
/// `(x, y)` lives at `data[x * ny + y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub source: String,
    pub info: String,
    pub shape: Vec<u32>,
    pub x_edges: Vec<f64>,
    pub y_edges: Option<Vec<f64>>,
    pub data: Vec<f64>,
}

impl HistogramSnapshot {
    /// Rank of the histogram (1 or 2).
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// Encode a snapshot as an hs00 frame.
pub fn encode_hs00(hist: &HistogramSnapshot) -> Vec<u8> {
    let mut w = FrameWriter::new();
    w.put_str(&hist.source);
    w.put_str(&hist.info);
    w.put_u32_array(&hist.shape);

    // Per-dimension metadata: bin count, element type tag, boundaries.
    w.put_u32(hist.rank() as u32);
    let dims: [Option<&Vec<f64>>; 2] = [Some(&hist.x_edges), hist.y_edges.as_ref()];
    for (i, edges) in dims.iter().take(hist.rank()).enumerate() {
        let edges = edges.expect("edge array present for every dimension");
        w.put_u32(hist.shape[i]);
        w.put_u8(ARRAY_DOUBLE);
        w.put_f64_array(edges);
    }

    w.put_f64_array(&hist.data);
    w.put_u8(ARRAY_DOUBLE);
    w.finish("hs00")
}

/// Decode an hs00 frame.
pub fn decode_hs00(buf: &[u8]) -> Result<HistogramSnapshot, CodecError> {
    check_header(buf, "hs00")?;

    let mut r = FrameReader::body(buf);
    let source = r.get_str()?;
    let info = r.get_str()?;
    let shape = r.get_u32_array()?;

    if shape.is_empty() || shape.len() > 2 {
        return Err(CodecError::MalformedFrame(format!(
            "unsupported histogram rank {}",
            shape.len()
        )));
    }

    let dim_count = r.get_u32()? as usize;
    if dim_count != shape.len() {
        return Err(CodecError::MalformedFrame(format!(
            "dimension metadata count {} does not match rank {}",
            dim_count,
            shape.len()
        )));
    }

    let mut edges = Vec::with_capacity(dim_count);
    for (i, &bins) in shape.iter().enumerate() {
        let length = r.get_u32()?;
        let type_tag = r.get_u8()?;
        if type_tag != ARRAY_DOUBLE {
            return Err(CodecError::UnsupportedArrayType(type_tag));
        }
        if length != bins {
            return Err(CodecError::MalformedFrame(format!(
                "dimension {} metadata length {} does not match shape {}",
                i, length, bins
            )));
        }
        edges.push(r.get_f64_array()?);
    }

    let data = r.get_f64_array()?;
    let data_type = r.get_u8()?;
    if data_type != ARRAY_DOUBLE {
        return Err(CodecError::UnsupportedArrayType(data_type));
    }

    let expected: usize = shape.iter().map(|&s| s as usize).product();
    if data.len() != expected {
        return Err(CodecError::MalformedFrame(format!(
            "data length {} does not match shape product {}",
            data.len(),
            expected
        )));
    }

    let mut edges = edges.into_iter();
    Ok(HistogramSnapshot {
        source,
        info,
        shape,
        x_edges: edges.next().expect("rank >= 1"),
        y_edges: edges.next(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_1d() -> HistogramSnapshot {
        HistogramSnapshot {
            source: "histd".to_string(),
            info: "job-1".to_string(),
            shape: vec![4],
            x_edges: vec![0.0, 25.0, 50.0, 75.0, 100.0],
            y_edges: None,
            data: vec![1.0, 0.0, 2.0, 5.0],
        }
    }

    fn snapshot_2d() -> HistogramSnapshot {
        HistogramSnapshot {
            source: "histd".to_string(),
            info: String::new(),
            shape: vec![2, 3],
            x_edges: vec![0.0, 50.0, 100.0],
            y_edges: vec![1.0, 2.0, 3.0, 4.0].into(),
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        }
    }

    #[test]
    fn test_round_trip_1d() {
        let h = snapshot_1d();
        assert_eq!(decode_hs00(&encode_hs00(&h)).unwrap(), h);
    }

    #[test]
    fn test_round_trip_2d() {
        let h = snapshot_2d();
        let decoded = decode_hs00(&encode_hs00(&h)).unwrap();
        assert_eq!(decoded.shape, vec![2, 3]);
        assert_eq!(decoded.y_edges, h.y_edges);
        assert_eq!(decoded.data, h.data);
    }

    #[test]
    fn test_schema_tag_at_offset_4() {
        let buf = encode_hs00(&snapshot_1d());
        assert_eq!(&buf[4..8], b"hs00");
    }

    #[test]
    fn test_wrong_schema_rejected() {
        let buf = encode_ev42_lookalike();
        assert!(matches!(
            decode_hs00(&buf),
            Err(CodecError::SchemaMismatch { .. })
        ));
    }

    fn encode_ev42_lookalike() -> Vec<u8> {
        let mut buf = encode_hs00(&snapshot_1d());
        buf[4..8].copy_from_slice(b"ev42");
        buf
    }

    #[test]
    fn test_unsupported_array_type() {
        let h = snapshot_1d();
        let mut buf = encode_hs00(&h);
        // The x-dimension type tag follows source, info, shape (1 entry),
        // dim count, and the dimension length.
        let tag_offset = 8 // header
            + 4 + h.source.len()
            + 4 + h.info.len()
            + 4 + 4 // shape array
            + 4 // dim count
            + 4; // dimension length
        assert_eq!(buf[tag_offset], ARRAY_DOUBLE);
        buf[tag_offset] = 9;
        assert_eq!(decode_hs00(&buf), Err(CodecError::UnsupportedArrayType(9)));
    }

    #[test]
    fn test_data_shape_mismatch_rejected() {
        let mut h = snapshot_2d();
        h.data.pop();
        let buf = encode_hs00(&h);
        assert!(matches!(
            decode_hs00(&buf),
            Err(CodecError::MalformedFrame(_))
        ));
    }
}
