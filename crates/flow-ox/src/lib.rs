//! Decoder for captured Anthropic Messages API SSE streams.
//!
//! An intercepting proxy hands this crate the raw `text/event-stream` body
//! of one streamed response, live or replayed from a flow file, and gets
//! back the reconstructed [`Message`]: text, tool calls with their parsed
//! inputs, thinking blocks, stop reason, and token usage.
//!
//! Bytes flow one direction through three pieces: the frame reader splits
//! the stream into SSE records ([`sse`]), the event parser types each
//! record's JSON payload ([`event`]), and the session folds the ordered
//! events into one growing message ([`session`]). Nothing in the pipeline
//! is fatal: malformed frames, unparseable events, and out-of-order
//! protocol traffic all degrade to a best-effort partial message plus a
//! recorded diagnostic, because a partially decoded flow is still worth
//! analyzing.
//!
//! ```rust
//! use flow_ox::decode_str;
//!
//! let capture = "\
//! event: message_start\n\
//! data: {\"message\":{\"id\":\"msg_1\",\"model\":\"claude-x\",\"usage\":{\"input_tokens\":10,\"output_tokens\":0}}}\n\n\
//! event: content_block_start\n\
//! data: {\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
//! event: content_block_delta\n\
//! data: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n\
//! event: content_block_stop\n\
//! data: {\"index\":0}\n\n\
//! event: message_stop\n\
//! data: {}\n\n";
//!
//! let decoded = decode_str(capture);
//! assert_eq!(decoded.message.text_content(), vec!["Hi"]);
//! assert!(!decoded.truncated);
//! ```

#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(clippy::pedantic, clippy::unwrap_used)]

pub mod error;
pub mod event;
pub mod message;
pub mod prelude;
pub mod session;
pub mod sse;
pub mod usage;

// Re-export main types
pub use error::{DecodeError, ErrorInfo, EventParseError};
pub use event::{StreamEvent, parse_frame};
pub use message::{ContentBlock, Message, Role, StopReason};
pub use session::{
    DecodeSession, Decoded, FrameDecoder, decode_reader, decode_str, decode_stream,
    decode_stream_to_end,
};
pub use sse::{Frame, FrameReader, frame_stream, read_frames};
pub use usage::Usage;
