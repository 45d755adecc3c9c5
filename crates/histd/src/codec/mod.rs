//! Wire-format codecs
//!
//! Length-prefixed binary frames with a 4-byte schema tag at offset 4.
//! Two schemas: ev42 (detector event batches) and hs00 (histogram
//! snapshots). Receivers dispatch on the tag without parsing the body.

pub mod ev42;
pub mod hs00;
pub mod wire;

pub use ev42::{decode_ev42, encode_ev42, EventMessage};
pub use hs00::{decode_hs00, encode_hs00, HistogramSnapshot};
pub use wire::schema_of;
