//! Error taxonomy for the sync core.
//!
//! None of these are fatal to a session: callers log them and keep running
//! with whatever state they already have.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A message arrived with a payload that does not match its event.
    #[error("malformed `{event}` payload: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// An outbound message could not be serialised.
    #[error("failed to encode `{event}`: {source}")]
    Encode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// The transport delivered an event name this client does not handle.
    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    /// The server acknowledged an older input than it already had.
    #[error("acknowledged sequence number went backwards ({ack} < {last})")]
    AckRegression { ack: u64, last: u64 },

    /// A pending input was recorded out of sequence order.
    #[error("pending input {got} does not follow {last}")]
    SequenceOrder { last: u64, got: u64 },
}

pub type Result<T> = std::result::Result<T, SyncError>;
