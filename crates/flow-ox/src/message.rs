use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{error::ErrorInfo, usage::Usage};

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    #[default]
    Assistant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Text {
    pub text: String,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn push_str(&mut self, string: &str) {
        self.text.push_str(string);
    }
}

/// A tool invocation reconstructed from streamed fragments.
///
/// While the block is open, `input_json_delta` fragments accumulate in
/// `partial_json`; `input` is only populated when the block stops and the
/// buffer parses as JSON. The buffer is kept verbatim either way so a failed
/// parse can still be inspected.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub partial_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
}

impl ToolUseBlock {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            partial_json: String::new(),
            input: None,
        }
    }
}

impl fmt::Display for ToolUseBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ToolUse(id: {}, name: {})", self.id, self.name)
    }
}

/// A reasoning trace block. The signature arrives late in the stream, either
/// via `signature_delta` fragments or together with the block stop.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThinkingBlock {
    pub thinking: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ThinkingBlock {
    pub fn new(thinking: impl Into<String>) -> Self {
        Self {
            thinking: thinking.into(),
            signature: None,
        }
    }
}

/// One unit of assistant output within a message.
///
/// The variant is fixed when the block starts and never changes afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(Text),
    ToolUse(ToolUseBlock),
    Thinking(ThinkingBlock),
}

impl ContentBlock {
    pub fn as_text(&self) -> Option<&Text> {
        if let Self::Text(text) = self {
            Some(text)
        } else {
            None
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        if let Self::ToolUse(tool_use) = self {
            Some(tool_use)
        } else {
            None
        }
    }

    pub fn as_thinking(&self) -> Option<&ThinkingBlock> {
        if let Self::Thinking(thinking) = self {
            Some(thinking)
        } else {
            None
        }
    }
}

/// One reconstructed API response, in progress or complete.
///
/// Content blocks are index-addressed and append-only: a block exists once
/// its `content_block_start` has been applied and is immutable once its
/// `content_block_stop` has been processed.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub model: String,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
    /// Populated when the stream carried an explicit `error` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Message {
    pub fn text_content(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|block| block.as_text().map(Text::as_str))
            .collect()
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUseBlock> {
        self.content.iter().filter_map(ContentBlock::as_tool_use)
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse(_)))
    }

    pub fn thinking_content(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|block| block.as_thinking().map(|t| t.thinking.as_str()))
            .collect()
    }

    pub fn has_thinking(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::Thinking(_)))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut content_summary = Vec::new();

        let text_parts = self.text_content();
        if !text_parts.is_empty() {
            content_summary.push(format!("text: [{}]", text_parts.join(", ")));
        }

        let thinking_parts = self.thinking_content();
        if !thinking_parts.is_empty() {
            content_summary.push(format!("thinking: [{}]", thinking_parts.len()));
        }

        if self.has_tool_use() {
            content_summary.push("tools".to_string());
        }

        write!(
            f,
            "Message {{ id: {}, model: {}, role: {}, content: {} }}",
            self.id,
            self.model,
            self.role,
            content_summary.join(", ")
        )
    }
}
