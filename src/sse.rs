//! Incremental Server-Sent Events frame decoding.
//!
//! The vendor streams frames of the form:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//!
//! ```
//!
//! Transport chunks do not respect frame boundaries. [`SseDecoder`] buffers raw bytes,
//! emits every complete (`\n\n`-terminated) frame, and keeps the trailing partial frame
//! until more bytes arrive or the stream ends. Buffering bytes rather than text means a
//! multi-byte UTF-8 sequence split across two chunks still decodes correctly.
//!
//! [`classify_frame`] then decides what a frame means: a data payload, the `[DONE]`
//! sentinel, or something to ignore (blank frames, comments, `event:`/`id:` fields).

use memchr::memmem;

/// Separator between frames.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Prefix of a data frame.
pub const DATA_PREFIX: &str = "data:";

/// Payload marking the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Split a fully-buffered body on the frame delimiter.
///
/// The last element is whatever followed the final delimiter (often empty).
/// Joining the result with [`FRAME_DELIMITER`] reproduces `buffer` exactly.
pub fn split_frames(buffer: &str) -> Vec<&str> {
    buffer.split(FRAME_DELIMITER).collect()
}

/// Meaning of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Trimmed payload of a `data:` frame
    Data(&'a str),
    /// The terminal sentinel
    Done,
    /// Blank frame or a field this protocol does not use
    Ignored,
}

/// Classify a raw frame.
pub fn classify_frame(frame: &str) -> Frame<'_> {
    // A run of three or more newlines leaves line breaks at the start of the next frame
    let frame = frame.trim_start_matches(['\r', '\n']);
    if frame.trim().is_empty() {
        return Frame::Ignored;
    }

    match frame.strip_prefix(DATA_PREFIX) {
        Some(rest) => {
            let payload = rest.trim();
            if payload == DONE_SENTINEL {
                Frame::Done
            } else if payload.is_empty() {
                Frame::Ignored
            } else {
                Frame::Data(payload)
            }
        }
        None => Frame::Ignored,
    }
}

/// Decoder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Accepting chunks
    Accumulating,
    /// Upstream ended; the remainder has been flushed
    Drained,
}

/// Incremental frame splitter. One per request.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched without finding a delimiter
    scanned: usize,
    state: DecoderState,
    finder: memmem::Finder<'static>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            state: DecoderState::Accumulating,
            finder: memmem::Finder::new(FRAME_DELIMITER.as_bytes()),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes held back as an incomplete frame.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append a chunk and return every frame it completed, in order.
    ///
    /// Chunks pushed after [`finish`](Self::finish) are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.state == DecoderState::Drained {
            log::warn!("SSE decoder received {} bytes after end of stream", chunk.len());
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        // A delimiter may straddle the old tail and the new chunk
        let mut search_from = self.scanned.saturating_sub(FRAME_DELIMITER.len() - 1);
        while let Some(pos) = self.finder.find(&self.buffer[search_from..]) {
            let end = search_from + pos;
            frames.push(String::from_utf8_lossy(&self.buffer[start..end]).into_owned());
            start = end + FRAME_DELIMITER.len();
            search_from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        frames
    }

    /// Signal end of stream. Returns the unterminated remainder, verbatim, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.state = DecoderState::Drained;
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }

    /// Decode a complete body in one go: every frame, remainder included.
    pub fn decode_all(body: &[u8]) -> Vec<String> {
        let mut decoder = Self::new();
        let mut frames = decoder.push(body);
        frames.extend(decoder.finish());
        frames
    }
}
