use std::collections::VecDeque;
use std::io::BufRead;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// One SSE record: the event name (if any) and the joined data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: String,
}

impl Frame {
    /// Event name for dispatch. A record with no `event:` field defaults to
    /// `"message"` per the SSE wire grammar.
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Incremental SSE record splitter.
///
/// Push raw bytes in as they arrive from the capture; complete frames come
/// out. The reader never fails: malformed bytes are decoded lossily and a
/// record cut off by the end of the stream is surfaced by [`finish`].
///
/// Records are blank-line terminated blocks of `field: value` lines.
/// Recognized fields are `event:` and `data:`; multiple `data:` lines in one
/// record are joined with `\n`. Comment lines (leading `:`) and other fields
/// (`id:`, `retry:`) are dropped. CRLF line endings are accepted.
///
/// [`finish`]: FrameReader::finish
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every frame it completes.
    ///
    /// Chunk boundaries may fall anywhere, including inside a multi-byte
    /// UTF-8 sequence; lines are only decoded once a newline arrives.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut frames);
        }
        frames
    }

    /// Flush whatever is buffered as a final best-effort frame.
    ///
    /// Returns `Some` only when the stream ended mid-record (a truncated
    /// capture); the caller should flag the session as truncated in that
    /// case rather than discard the tail.
    pub fn finish(&mut self) -> Option<Frame> {
        let mut frames = Vec::new();
        if !self.buf.is_empty() {
            let line_bytes = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&line_bytes).into_owned();
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut frames);
        }
        // A trailing bare CR can reduce to a blank line and complete the
        // record right here.
        if let Some(frame) = frames.pop() {
            return Some(frame);
        }
        if self.event.is_some() || !self.data_lines.is_empty() {
            Some(Frame {
                event: self.event.take(),
                data: std::mem::take(&mut self.data_lines).join("\n"),
            })
        } else {
            None
        }
    }

    /// True while a record is partially buffered.
    pub fn is_mid_record(&self) -> bool {
        !self.buf.is_empty() || self.event.is_some() || !self.data_lines.is_empty()
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<Frame>) {
        if line.is_empty() {
            if let Some(frame) = self.take_record() {
                frames.push(frame);
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        // A line with no colon is a field name with an empty value.
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            _ => {}
        }
    }

    fn take_record(&mut self) -> Option<Frame> {
        let event = self.event.take();
        let data_lines = std::mem::take(&mut self.data_lines);
        if data_lines.is_empty() {
            // Records with no data dispatch nothing; the event name buffer
            // resets regardless.
            None
        } else {
            Some(Frame {
                event,
                data: data_lines.join("\n"),
            })
        }
    }
}

/// Iterate frames from a blocking reader, for captured flow replay.
pub fn read_frames<R: BufRead>(reader: R) -> Frames<R> {
    Frames {
        reader,
        parser: FrameReader::new(),
        queue: VecDeque::new(),
        done: false,
        truncated: false,
    }
}

/// Blocking frame iterator over a [`BufRead`] source.
///
/// Read errors are treated as end-of-stream: whatever was buffered is
/// emitted best-effort and [`truncated`] reports that the source ended
/// mid-record.
///
/// [`truncated`]: Frames::truncated
#[derive(Debug)]
pub struct Frames<R> {
    reader: R,
    parser: FrameReader,
    queue: VecDeque<Frame>,
    done: bool,
    truncated: bool,
}

impl<R> Frames<R> {
    /// True once the source ended in the middle of a record.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl<R: BufRead> Iterator for Frames<R> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.queue.pop_front() {
                return Some(frame);
            }
            if self.done {
                return None;
            }
            match self.reader.fill_buf() {
                Ok(chunk) if chunk.is_empty() => {
                    self.done = true;
                    if let Some(frame) = self.parser.finish() {
                        self.truncated = true;
                        self.queue.push_back(frame);
                    }
                }
                Ok(chunk) => {
                    let consumed = chunk.len();
                    self.queue.extend(self.parser.push(chunk));
                    self.reader.consume(consumed);
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(_) => {
                    self.done = true;
                    if let Some(frame) = self.parser.finish() {
                        self.truncated = true;
                        self.queue.push_back(frame);
                    }
                }
            }
        }
    }
}

/// Split an async byte stream into frames, for live tailing.
///
/// The only suspension point is the underlying stream's `next()`; once a
/// chunk is available, framing is synchronous. A record left dangling when
/// the source ends is yielded as a final best-effort frame.
pub fn frame_stream<S>(source: S) -> impl Stream<Item = Frame>
where
    S: Stream<Item = Bytes>,
{
    async_stream::stream! {
        futures_util::pin_mut!(source);
        let mut parser = FrameReader::new();
        while let Some(chunk) = source.next().await {
            for frame in parser.push(&chunk) {
                yield frame;
            }
        }
        if let Some(frame) = parser.finish() {
            yield frame;
        }
    }
}
