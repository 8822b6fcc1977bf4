use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error payload carried by an `error` SSE event, as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub r#type: String,
    pub message: String,
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.r#type, self.message)
    }
}

/// Failure to turn one SSE frame into a typed event.
///
/// The raw payload is preserved so observability tooling can report what the
/// wire actually contained.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed `{event}` payload: {reason}")]
pub struct EventParseError {
    /// Event name as it appeared on the wire.
    pub event: String,
    /// The data payload that failed to parse, unmodified.
    pub data: String,
    pub reason: String,
}

/// Non-fatal diagnostics recorded while decoding one stream.
///
/// None of these abort a decode session: every variant degrades to a
/// best-effort partial message plus this record. Batch analysis over many
/// captured flows relies on that.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The capture ended mid-record; the trailing frame was decoded
    /// best-effort rather than discarded.
    #[error("stream ended mid-record; trailing frame decoded best-effort")]
    TruncatedFrame,

    /// A known event whose JSON payload failed to deserialize. The event is
    /// skipped and decoding continues.
    #[error(transparent)]
    EventParse(#[from] EventParseError),

    /// An event arrived in a position the protocol does not allow
    /// (duplicate block index, delta for a block that is not open, events
    /// after the message stopped). The event is dropped; existing content is
    /// never overwritten.
    #[error("dropped out-of-order `{event}` event (index {index:?})")]
    OutOfOrder {
        event: &'static str,
        index: Option<usize>,
    },

    /// The concatenated tool-input buffer was not valid JSON when its block
    /// stopped. The block's `input` stays empty; the buffer is preserved for
    /// inspection.
    #[error("tool input for content block {index} is not valid JSON: {reason}")]
    ToolInputParse { index: usize, reason: String },

    /// The API itself reported an error mid-stream. Terminal for the
    /// session, but the partial message remains available.
    #[error("upstream error: {0}")]
    Upstream(ErrorInfo),
}

impl DecodeError {
    /// True for the one error class that ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}
