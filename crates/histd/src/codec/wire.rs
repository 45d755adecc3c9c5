//! Low-level frame layout helpers
//!
//! Every frame starts with a u32 payload length followed by a 4-byte ASCII
//! schema tag, so the tag always sits at bytes [4..8). All integers are
//! little-endian.

use crate::error::CodecError;

/// Byte offset of the schema tag within a frame.
pub const SCHEMA_OFFSET: usize = 4;

/// Minimum size of any frame: length prefix + schema tag.
pub const HEADER_LEN: usize = 8;

/// Extract the schema tag embedded in a frame.
pub fn schema_of(buf: &[u8]) -> Result<&str, CodecError> {
    if buf.len() < HEADER_LEN {
        return Err(CodecError::MalformedFrame(format!(
            "frame too short for header: {} bytes",
            buf.len()
        )));
    }
    std::str::from_utf8(&buf[SCHEMA_OFFSET..SCHEMA_OFFSET + 4])
        .map_err(|_| CodecError::MalformedFrame("schema tag is not UTF-8".into()))
}

/// Verify the schema tag and the declared payload length.
pub fn check_header(buf: &[u8], expected: &'static str) -> Result<(), CodecError> {
    let found = schema_of(buf)?;
    if found != expected {
        return Err(CodecError::SchemaMismatch {
            expected,
            found: found.to_string(),
        });
    }
    let declared = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if declared != buf.len() - 4 {
        return Err(CodecError::MalformedFrame(format!(
            "declared payload length {} does not match frame size {}",
            declared,
            buf.len() - 4
        )));
    }
    Ok(())
}

/// Append-only frame builder.
///
/// Reserves the header up front; `finish` fills in the length prefix and
/// patches the schema tag at offset 4, matching the on-wire convention of
/// receivers dispatching on bytes [4..8) without parsing the body.
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; HEADER_LEN],
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_str(&mut self, s: &str) {
        self.put_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn put_i32_array(&mut self, values: &[i32]) {
        self.put_u32(values.len() as u32);
        for v in values {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn put_u32_array(&mut self, values: &[u32]) {
        self.put_u32(values.len() as u32);
        for v in values {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn put_f64_array(&mut self, values: &[f64]) {
        self.put_u32(values.len() as u32);
        for v in values {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Finalize the frame: write the length prefix and patch the schema tag.
    pub fn finish(mut self, schema: &'static str) -> Vec<u8> {
        debug_assert_eq!(schema.len(), 4);
        let payload_len = (self.buf.len() - 4) as u32;
        self.buf[0..4].copy_from_slice(&payload_len.to_le_bytes());
        self.buf[SCHEMA_OFFSET..SCHEMA_OFFSET + 4].copy_from_slice(schema.as_bytes());
        self.buf
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds-checked cursor over a frame body.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Start reading a frame body, after the header has been checked.
    pub fn body(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: HEADER_LEN,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.buf.len() {
            return Err(CodecError::MalformedFrame(format!(
                "truncated buffer: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8-byte slice")))
    }

    pub fn get_i64(&mut self) -> Result<i64, CodecError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().expect("8-byte slice")))
    }

    pub fn get_str(&mut self) -> Result<String, CodecError> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CodecError::MalformedFrame("string field is not UTF-8".into()))
    }

    pub fn get_i32_array(&mut self) -> Result<Vec<i32>, CodecError> {
        let count = self.get_u32()? as usize;
        let bytes = self.take(count.checked_mul(4).ok_or_else(|| {
            CodecError::MalformedFrame("array length overflow".into())
        })?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn get_u32_array(&mut self) -> Result<Vec<u32>, CodecError> {
        let count = self.get_u32()? as usize;
        let bytes = self.take(count.checked_mul(4).ok_or_else(|| {
            CodecError::MalformedFrame("array length overflow".into())
        })?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn get_f64_array(&mut self) -> Result<Vec<f64>, CodecError> {
        let count = self.get_u32()? as usize;
        let bytes = self.take(count.checked_mul(8).ok_or_else(|| {
            CodecError::MalformedFrame("array length overflow".into())
        })?)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().expect("8-byte chunk")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_scalars() {
        let mut w = FrameWriter::new();
        w.put_u64(42);
        w.put_i64(-7);
        w.put_str("detector_a");
        let buf = w.finish("ev42");

        assert_eq!(&buf[4..8], b"ev42");
        check_header(&buf, "ev42").unwrap();

        let mut r = FrameReader::body(&buf);
        assert_eq!(r.get_u64().unwrap(), 42);
        assert_eq!(r.get_i64().unwrap(), -7);
        assert_eq!(r.get_str().unwrap(), "detector_a");
    }

    #[test]
    fn test_truncated_read_fails() {
        let mut w = FrameWriter::new();
        w.put_u32(100); // claims a 100-element array with no elements
        let buf = w.finish("hs00");

        let mut r = FrameReader::body(&buf);
        assert!(matches!(
            r.get_i32_array(),
            Err(CodecError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_length_prefix_mismatch() {
        let mut w = FrameWriter::new();
        w.put_u64(1);
        let mut buf = w.finish("ev42");
        buf.push(0xff); // extra trailing byte
        assert!(matches!(
            check_header(&buf, "ev42"),
            Err(CodecError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_short_buffer() {
        assert!(matches!(
            schema_of(&[0, 1, 2]),
            Err(CodecError::MalformedFrame(_))
        ));
    }
}
