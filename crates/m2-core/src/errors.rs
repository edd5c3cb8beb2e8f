//! Error types for frame decoding and dictionary loading.

use thiserror::Error;

/// Reasons an inbound device frame is dropped.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than the fixed 7-byte header.
    #[error("frame too short: {len} bytes, need at least {min}")]
    Truncated {
        /// Bytes actually received.
        len: usize,
        /// Minimum frame size.
        min: usize,
    },
    /// The dictionary has no layout for this message id.
    #[error("no definition for message {0}")]
    UnknownMessage(u16),
}

impl DecodeError {
    /// Short classification string for logging/metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Truncated { .. } => "truncated",
            Self::UnknownMessage(_) => "unknown_message",
        }
    }
}

/// Errors that can occur when loading a signal dictionary.
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// Failed to read the dictionary file.
    #[error("failed to read dictionary file: {0}")]
    Io(#[from] std::io::Error),
    /// The dictionary file is not valid JSON for the expected layout.
    #[error("failed to parse dictionary JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Two signals share a mnemonic.
    #[error("duplicate signal mnemonic: {0}")]
    DuplicateSignal(String),
    /// Structurally valid JSON with inconsistent content.
    #[error("invalid dictionary: {0}")]
    Invalid(String),
}

/// Result type for dictionary operations.
pub type Result<T> = std::result::Result<T, DictionaryError>;
