//! Error types shared across the daemon

use thiserror::Error;

/// Errors raised while encoding or decoding wire frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The 4-byte schema tag at offset 4 did not match the expected schema.
    #[error("incorrect schema: expected {expected} but got {found}")]
    SchemaMismatch {
        expected: &'static str,
        found: String,
    },

    /// The buffer was truncated or internally inconsistent.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A histogram frame carried an array type other than ArrayDouble.
    #[error("unsupported array type tag: {0}")]
    UnsupportedArrayType(u8),
}

/// Errors raised by bus transports.
#[derive(Debug, Error)]
pub enum BusError {
    /// Brokers could not be resolved or connected to.
    #[error("bus unavailable: {0}")]
    Unavailable(String),

    /// I/O failure in the file transport.
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was shut down while an operation was in flight.
    #[error("bus connection closed")]
    Closed,
}

/// Histogram parameter validation failure.
///
/// Collects the names of all missing and invalid parameters so a single
/// status record can report everything wrong with a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {kind} configuration: missing {missing:?}, invalid {invalid:?}")]
pub struct ConfigurationError {
    pub kind: String,
    pub missing: Vec<String>,
    pub invalid: Vec<String>,
}

/// Failure to bring up a histogramming job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error(transparent)]
    Bus(#[from] BusError),
}
