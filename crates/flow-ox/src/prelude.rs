//! Common imports for working with captured streams.
//!
//! This module re-exports the most commonly used types and functions.
//!
//! ```rust
//! use flow_ox::prelude::*;
//!
//! let decoded = decode_str("event: message_stop\ndata: {}\n\n");
//! assert!(decoded.message.content.is_empty());
//! ```

pub use crate::{
    error::{DecodeError, ErrorInfo, EventParseError},
    event::{BlockStart, ContentDelta, MessageDelta, MessageStart, StreamEvent, parse_frame},
    message::{ContentBlock, Message, Role, StopReason, Text, ThinkingBlock, ToolUseBlock},
    session::{
        DecodeSession, Decoded, FrameDecoder, decode_reader, decode_str, decode_stream,
        decode_stream_to_end,
    },
    sse::{Frame, FrameReader, Frames, frame_stream, read_frames},
    usage::Usage,
};
