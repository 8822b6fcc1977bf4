use std::io::BufRead;

use bon::Builder;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::{
    error::{DecodeError, EventParseError},
    event::{ContentDelta, StreamEvent, parse_frame},
    message::{ContentBlock, Message},
    sse::{Frame, FrameReader, read_frames},
};

/// Assembler position in the message lifecycle.
///
/// The protocol interleaves one `message_start`, zero or more
/// open-block/close-block cycles with exactly one block open at a time,
/// message-level deltas, and one `message_stop`. Encoding that as an explicit
/// state machine makes illegal sequences detectable instead of silently
/// corrupting the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum SessionState {
    #[default]
    Idle,
    Started,
    BlockOpen(usize),
    Stopped,
    Errored,
}

/// Folds an ordered sequence of stream events into one growing [`Message`].
///
/// A session is single-threaded and consumed by one caller; create a fresh
/// one per stream. No event makes [`apply`] fail: protocol anomalies are
/// recorded in the issue log and the message stays valid and inspectable at
/// every point, which is what offline flow analysis needs.
///
/// [`apply`]: DecodeSession::apply
#[derive(Debug, Builder)]
pub struct DecodeSession {
    /// When set, a `content_block_start` whose index skips ahead of the
    /// expected one is dropped instead of opening a block.
    #[builder(default = true)]
    strict_ordering: bool,
    #[builder(skip)]
    state: SessionState,
    #[builder(skip)]
    message: Message,
    #[builder(skip)]
    next_index: usize,
    #[builder(skip)]
    truncated: bool,
    #[builder(skip)]
    issues: Vec<DecodeError>,
}

impl Default for DecodeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeSession {
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// The message as reconstructed so far.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Owned copy of the in-progress message, for incremental observation.
    pub fn snapshot(&self) -> Message {
        self.message.clone()
    }

    /// Non-fatal diagnostics recorded so far.
    pub fn issues(&self) -> &[DecodeError] {
        &self.issues
    }

    /// True once `message_stop` has been applied.
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Stopped
    }

    /// True once an upstream `error` event has been applied.
    pub fn is_errored(&self) -> bool {
        self.state == SessionState::Errored
    }

    /// Record that the source ended in the middle of an SSE record.
    pub fn note_truncated_tail(&mut self) {
        self.truncated = true;
        self.issues.push(DecodeError::TruncatedFrame);
    }

    /// Record a frame that failed to parse into a typed event.
    pub fn note_event_error(&mut self, err: EventParseError) {
        warn!(event = %err.event, reason = %err.reason, "skipping unparseable event");
        self.issues.push(DecodeError::EventParse(err));
    }

    /// Parse one frame and apply it, returning the typed event when the
    /// frame was parseable. Parse failures are recorded and yield `None`.
    pub fn ingest(&mut self, frame: &Frame) -> Option<StreamEvent> {
        match parse_frame(frame) {
            Ok(event) => {
                self.apply(&event);
                Some(event)
            }
            Err(err) => {
                self.note_event_error(err);
                None
            }
        }
    }

    /// Apply one event to the in-progress message.
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Ping => {}
            StreamEvent::Unknown { event, .. } => {
                debug!(event = %event, "ignoring unknown event type");
            }
            StreamEvent::Error { error } => {
                // Terminal, but the partially-built message stays available.
                self.message.error = Some(error.clone());
                self.issues.push(DecodeError::Upstream(error.clone()));
                self.state = SessionState::Errored;
            }
            StreamEvent::MessageStart { message } => {
                if self.state != SessionState::Idle {
                    self.drop_event("message_start", None);
                    return;
                }
                self.message.id = message.id.clone();
                self.message.model = message.model.clone();
                self.message.role = message.role;
                self.message.usage = message.usage.clone();
                self.state = SessionState::Started;
            }
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if self.state != SessionState::Started {
                    self.drop_event("content_block_start", Some(*index));
                    return;
                }
                if *index < self.next_index {
                    // Duplicate or rewound index: never overwrite an
                    // existing block.
                    self.drop_event("content_block_start", Some(*index));
                    return;
                }
                if *index > self.next_index && self.strict_ordering {
                    self.drop_event("content_block_start", Some(*index));
                    return;
                }
                if *index > self.next_index {
                    warn!(
                        index = *index,
                        expected = self.next_index,
                        "accepting content_block_start that skipped ahead"
                    );
                }
                self.message
                    .content
                    .push(ContentBlock::from(content_block.clone()));
                self.next_index = *index + 1;
                self.state = SessionState::BlockOpen(*index);
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                if self.state != SessionState::BlockOpen(*index) {
                    self.drop_event("content_block_delta", Some(*index));
                    return;
                }
                self.apply_delta(*index, delta);
            }
            StreamEvent::ContentBlockStop { index } => {
                if self.state != SessionState::BlockOpen(*index) {
                    self.drop_event("content_block_stop", Some(*index));
                    return;
                }
                self.close_block(*index);
                self.state = SessionState::Started;
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if self.state != SessionState::Started {
                    self.drop_event("message_delta", None);
                    return;
                }
                if let Some(reason) = delta.stop_reason {
                    self.message.stop_reason = Some(reason);
                }
                if let Some(sequence) = &delta.stop_sequence {
                    self.message.stop_sequence = Some(sequence.clone());
                }
                if let Some(usage) = usage {
                    self.message.usage.merge_delta(usage);
                }
            }
            StreamEvent::MessageStop => {
                if self.state != SessionState::Started {
                    self.drop_event("message_stop", None);
                    return;
                }
                self.state = SessionState::Stopped;
            }
        }
    }

    /// Freeze the session into its final result.
    ///
    /// A session that never reached `message_stop` (or an upstream error) is
    /// flagged truncated; whatever was reconstructed is returned as-is,
    /// including a still-open block.
    pub fn finish(mut self) -> Decoded {
        if !matches!(self.state, SessionState::Stopped | SessionState::Errored) {
            self.truncated = true;
        }
        Decoded {
            errored: self.state == SessionState::Errored,
            message: self.message,
            truncated: self.truncated,
            issues: self.issues,
        }
    }

    fn apply_delta(&mut self, index: usize, delta: &ContentDelta) {
        // Blocks open in order and only the newest can be open, so the open
        // block is always the last one.
        let applied = match (self.message.content.last_mut(), delta) {
            (Some(ContentBlock::Text(text)), ContentDelta::TextDelta { text: fragment }) => {
                text.push_str(fragment);
                true
            }
            (
                Some(ContentBlock::ToolUse(tool_use)),
                ContentDelta::InputJsonDelta { partial_json },
            ) => {
                tool_use.partial_json.push_str(partial_json);
                true
            }
            (
                Some(ContentBlock::Thinking(thinking)),
                ContentDelta::ThinkingDelta { thinking: fragment },
            ) => {
                thinking.thinking.push_str(fragment);
                true
            }
            (Some(ContentBlock::Thinking(thinking)), ContentDelta::SignatureDelta { signature }) => {
                thinking
                    .signature
                    .get_or_insert_with(String::new)
                    .push_str(signature);
                true
            }
            _ => false,
        };
        if !applied {
            self.drop_event("content_block_delta", Some(index));
        }
    }

    fn close_block(&mut self, index: usize) {
        if let Some(ContentBlock::ToolUse(tool_use)) = self.message.content.last_mut() {
            if tool_use.partial_json.is_empty() {
                // Tools invoked without arguments stream no input fragments.
                tool_use.input = Some(serde_json::Value::Object(serde_json::Map::new()));
            } else {
                match serde_json::from_str(&tool_use.partial_json) {
                    Ok(value) => tool_use.input = Some(value),
                    Err(err) => {
                        warn!(index, reason = %err, "tool input buffer is not valid JSON");
                        self.issues.push(DecodeError::ToolInputParse {
                            index,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn drop_event(&mut self, event: &'static str, index: Option<usize>) {
        warn!(
            event,
            ?index,
            state = ?self.state,
            "dropping out-of-order event"
        );
        self.issues.push(DecodeError::OutOfOrder { event, index });
    }
}

/// Final result of draining one decode session.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// The reconstructed message, complete or best-effort partial.
    pub message: Message,
    /// The source ended before `message_stop` or mid-record.
    pub truncated: bool,
    /// The stream carried an explicit upstream `error` event.
    pub errored: bool,
    /// Every non-fatal diagnostic recorded along the way.
    pub issues: Vec<DecodeError>,
}

/// Lazily decode an iterator of frames, yielding each typed event together
/// with a snapshot of the message after it was applied.
///
/// The sequence is finite and not restartable; create a fresh decoder to
/// replay a capture. Frames that fail to parse are recorded in the session's
/// issue log and skipped.
#[derive(Debug)]
pub struct FrameDecoder<I> {
    frames: I,
    session: DecodeSession,
}

impl<I> FrameDecoder<I> {
    pub fn new(frames: I) -> Self {
        Self::with_session(frames, DecodeSession::new())
    }

    pub fn with_session(frames: I, session: DecodeSession) -> Self {
        Self { frames, session }
    }

    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    /// Freeze the underlying session. Callers normally drain the iterator
    /// first; any frames not yet pulled are simply never decoded.
    pub fn finish(self) -> Decoded {
        self.session.finish()
    }
}

impl<I: Iterator<Item = Frame>> Iterator for FrameDecoder<I> {
    type Item = (StreamEvent, Message);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.frames.next()?;
            if let Some(event) = self.session.ingest(&frame) {
                let snapshot = self.session.snapshot();
                return Some((event, snapshot));
            }
        }
    }
}

/// Decode a complete captured SSE body held in memory.
pub fn decode_str(input: &str) -> Decoded {
    decode_reader(input.as_bytes())
}

/// Decode frames from a blocking reader, draining to the final message.
///
/// Never returns an error: a source that is empty or ends before
/// `message_start` yields an empty skeleton with `truncated` set, so batch
/// analysis over many flow files never aborts on one bad capture.
pub fn decode_reader<R: BufRead>(reader: R) -> Decoded {
    let mut session = DecodeSession::new();
    let mut frames = read_frames(reader);
    for frame in &mut frames {
        session.ingest(&frame);
    }
    if frames.truncated() {
        session.note_truncated_tail();
    }
    session.finish()
}

/// Lazily decode an async byte stream, yielding `(event, snapshot)` pairs.
///
/// The only suspension point is the source stream's `next()`; callers pick
/// their own runtime and timeout policy around it.
pub fn decode_stream<S>(source: S) -> impl Stream<Item = (StreamEvent, Message)>
where
    S: Stream<Item = Bytes>,
{
    async_stream::stream! {
        futures_util::pin_mut!(source);
        let mut reader = FrameReader::new();
        let mut session = DecodeSession::new();
        while let Some(chunk) = source.next().await {
            for frame in reader.push(&chunk) {
                if let Some(event) = session.ingest(&frame) {
                    yield (event, session.snapshot());
                }
            }
        }
        if let Some(frame) = reader.finish() {
            session.note_truncated_tail();
            if let Some(event) = session.ingest(&frame) {
                yield (event, session.snapshot());
            }
        }
    }
}

/// Drain an async byte stream to its final decoded result.
pub async fn decode_stream_to_end<S>(source: S) -> Decoded
where
    S: Stream<Item = Bytes>,
{
    futures_util::pin_mut!(source);
    let mut reader = FrameReader::new();
    let mut session = DecodeSession::new();
    while let Some(chunk) = source.next().await {
        for frame in reader.push(&chunk) {
            session.ingest(&frame);
        }
    }
    if let Some(frame) = reader.finish() {
        session.note_truncated_tail();
        session.ingest(&frame);
    }
    session.finish()
}
