//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering every way an encode or decode can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // Encoding errors
    /// A string crossing the backend boundary contains a NUL byte.
    #[error("interior NUL byte in {field}")]
    InteriorNul {
        /// Which part of the payload carried the NUL.
        field: &'static str,
    },

    /// Environment key is empty or contains `=`.
    #[error("invalid environment key: {0:?}")]
    InvalidEnvKey(String),

    // Decoding errors
    /// The command line has an unbalanced quote or a dangling escape.
    #[error("malformed command line: {0}")]
    MalformedCommandLine(String),

    /// The command line contained no words at all.
    #[error("empty command line")]
    EmptyCommandLine,

    /// An environment block entry has no `=` separator.
    #[error("malformed environment entry: {0:?}")]
    MalformedEnvEntry(String),

    /// Bytes that should be UTF-8 are not.
    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 {
        /// Which part of the payload failed to decode.
        field: &'static str,
    },
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<std::ffi::NulError> for ProtocolError {
    fn from(_: std::ffi::NulError) -> Self {
        ProtocolError::InteriorNul { field: "string" }
    }
}
