//! Server error types.

use thiserror::Error;

/// Errors starting or running the gateway server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Other socket I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a client envelope is ignored.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Not a JSON `{event, data}` object.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    /// `subscribe`/`unsubscribe` without a string signal name.
    #[error("{event} requires a signal name")]
    MissingSignalName {
        /// Event that needed the name.
        event: String,
    },
}
