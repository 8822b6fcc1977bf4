use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{ErrorInfo, EventParseError},
    message::{ContentBlock, Role, StopReason, Text, ThinkingBlock, ToolUseBlock},
    sse::Frame,
    usage::Usage,
};

/// Message skeleton carried by `message_start`.
///
/// Truncated captures sometimes lack the `role` field; it defaults to
/// assistant, which is the only role the response side ever carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageStart {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub usage: Usage,
}

/// Block skeleton carried by `content_block_start`. The variant fixes the
/// block's type for the rest of its life.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        signature: Option<String>,
    },
}

impl From<BlockStart> for ContentBlock {
    fn from(start: BlockStart) -> Self {
        match start {
            BlockStart::Text { text } => ContentBlock::Text(Text { text }),
            BlockStart::ToolUse { id, name } => ContentBlock::ToolUse(ToolUseBlock::new(id, name)),
            BlockStart::Thinking {
                thinking,
                signature,
            } => ContentBlock::Thinking(ThinkingBlock {
                thinking,
                signature,
            }),
        }
    }
}

/// One incremental fragment of an open content block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
}

/// Message-level updates carried by `message_delta`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageDelta {
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

/// One decoded SSE frame.
///
/// Produced by [`parse_frame`], consumed exactly once by the assembler.
/// Event names the decoder does not model map to [`StreamEvent::Unknown`]
/// rather than an error; the upstream protocol grows new event types
/// independently of this tool and old captures must keep decoding.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessageStart,
    },
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDelta,
        usage: Option<Usage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorInfo,
    },
    Unknown {
        event: String,
        raw: serde_json::Value,
    },
}

impl StreamEvent {
    /// Extract the text fragment if this is a text delta.
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentBlockDelta {
                delta: ContentDelta::TextDelta { text },
                ..
            } => Some(text),
            _ => None,
        }
    }

    pub fn is_message_stop(&self) -> bool {
        matches!(self, StreamEvent::MessageStop)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error { .. })
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, EventParseError> {
    serde_json::from_str(data).map_err(|err| EventParseError {
        event: event.to_string(),
        data: data.to_string(),
        reason: err.to_string(),
    })
}

/// Turn one SSE frame into a typed event.
///
/// Dispatch is on the frame's event name; the payload's own `"type"` tag is
/// not required to agree. A `[DONE]` sentinel (appended by some proxies) and
/// unrecognized event names pass through as [`StreamEvent::Unknown`]. A
/// malformed payload for a known event is a recoverable per-event error; it
/// never terminates the decode session.
pub fn parse_frame(frame: &Frame) -> Result<StreamEvent, EventParseError> {
    let event = frame.event_name();
    let data = frame.data.trim();

    if data == "[DONE]" {
        return Ok(StreamEvent::Unknown {
            event: event.to_string(),
            raw: serde_json::Value::String(data.to_string()),
        });
    }

    match event {
        "message_start" => {
            #[derive(Deserialize)]
            struct Payload {
                message: MessageStart,
            }
            let Payload { message } = payload(event, data)?;
            Ok(StreamEvent::MessageStart { message })
        }
        "content_block_start" => {
            #[derive(Deserialize)]
            struct Payload {
                index: usize,
                content_block: BlockStart,
            }
            let Payload {
                index,
                content_block,
            } = payload(event, data)?;
            Ok(StreamEvent::ContentBlockStart {
                index,
                content_block,
            })
        }
        "content_block_delta" => {
            #[derive(Deserialize)]
            struct Payload {
                index: usize,
                delta: ContentDelta,
            }
            let Payload { index, delta } = payload(event, data)?;
            Ok(StreamEvent::ContentBlockDelta { index, delta })
        }
        "content_block_stop" => {
            #[derive(Deserialize)]
            struct Payload {
                index: usize,
            }
            let Payload { index } = payload(event, data)?;
            Ok(StreamEvent::ContentBlockStop { index })
        }
        "message_delta" => {
            #[derive(Deserialize)]
            struct Payload {
                delta: MessageDelta,
                #[serde(default)]
                usage: Option<Usage>,
            }
            let Payload { delta, usage } = payload(event, data)?;
            Ok(StreamEvent::MessageDelta { delta, usage })
        }
        // These two carry no fields the assembler needs; an empty or odd
        // payload is not worth failing over.
        "message_stop" => Ok(StreamEvent::MessageStop),
        "ping" => Ok(StreamEvent::Ping),
        "error" => {
            #[derive(Deserialize)]
            struct Payload {
                error: ErrorInfo,
            }
            let Payload { error } = payload(event, data)?;
            Ok(StreamEvent::Error { error })
        }
        _ => {
            let raw = serde_json::from_str(data)
                .unwrap_or_else(|_| serde_json::Value::String(data.to_string()));
            Ok(StreamEvent::Unknown {
                event: event.to_string(),
                raw,
            })
        }
    }
}
