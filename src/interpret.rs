//! Chunk interpretation and tool-call reassembly.
//!
//! [`ChunkInterpreter`] turns one decoded SSE frame into zero or more
//! [`NormalizedEvent`]s. It never fails: a frame that is not valid JSON is logged,
//! counted and skipped, and the next frame is interpreted as usual.
//!
//! Event order within a frame follows the parsed choices. For each choice:
//!
//! 1. a non-empty `delta.content` becomes [`NormalizedEvent::TextDelta`]
//! 2. each `delta.tool_calls` entry becomes one [`NormalizedEvent::ToolCallDelta`]
//! 3. a non-null `finish_reason` becomes [`NormalizedEvent::Done`]
//!
//! Tool-call deltas are forwarded one per wire entry, addressed by `index`. The
//! argument text is decoded as JSON immediately when it is complete on its own
//! (an empty string decodes to `{}`); fragments that only make sense once joined
//! are forwarded with `input: None`. [`ToolCallAccumulator`] joins them:
//!
//! ```text
//! frame 1: tool_calls[0] = { id: "call_1", name: "read_file", arguments: "" }
//! frame 2: tool_calls[0] = { arguments: "{\"target_file\":" }
//! frame 3: tool_calls[0] = { arguments: "\"main.rs\"}" }
//! frame 4: tool_calls[1] = { id: "call_2", name: "list_dir", arguments: "{}" }   <- flushes index 0
//! end of stream                                                                <- flushes index 1
//! ```

use crate::sse::{Frame, classify_frame};
use crate::types::{NormalizedEvent, ToolCallDelta, WireChunk};
use serde_json::Value;
use std::collections::BTreeMap;

/// Decode tool arguments the way the vendor's complete-argument form expects:
/// blank means "no arguments", anything else must be JSON on its own.
pub fn decode_arguments(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return Some(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw).ok()
}

/// Stateless-per-frame interpreter with diagnostic counters.
#[derive(Debug, Default)]
pub struct ChunkInterpreter {
    frames: usize,
    skipped: usize,
    last_error: Option<String>,
}

impl ChunkInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret a raw frame (still carrying its `data:` marker).
    ///
    /// Sentinel, blank and non-data frames produce nothing.
    pub fn interpret_frame(&mut self, frame: &str) -> Vec<NormalizedEvent> {
        match classify_frame(frame) {
            Frame::Data(payload) => self.interpret(payload),
            Frame::Done => {
                log::debug!("Stream complete marker found");
                Vec::new()
            }
            Frame::Ignored => Vec::new(),
        }
    }

    /// Interpret a JSON payload.
    pub fn interpret(&mut self, payload: &str) -> Vec<NormalizedEvent> {
        self.frames += 1;

        let chunk: WireChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.skipped += 1;
                let preview: String = payload.chars().take(100).collect();
                log::warn!("Failed to parse chunk: {} ({})", preview, e);
                self.last_error = Some(e.to_string());
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    events.push(NormalizedEvent::TextDelta(content));
                }
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match call.function {
                    Some(function) => (function.name, function.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };
                log::debug!(
                    "Tool call delta: index={} name={:?} args={} bytes",
                    call.index,
                    name,
                    arguments.len()
                );
                let input = decode_arguments(&arguments);
                events.push(NormalizedEvent::ToolCallDelta(ToolCallDelta {
                    index: call.index,
                    call_id: call.id,
                    name,
                    arguments,
                    input,
                }));
            }

            if let Some(reason) = choice.finish_reason {
                events.push(NormalizedEvent::Done(reason));
            }
        }

        events
    }

    /// Data frames seen so far.
    pub fn frames_seen(&self) -> usize {
        self.frames
    }

    /// Data frames skipped because they were not valid chunk JSON.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    /// Parse error from the most recently skipped frame.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// A tool call reassembled from its deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedToolCall {
    pub index: u32,
    pub id: String,
    pub name: String,
    /// Concatenated argument text
    pub arguments: String,
    /// `arguments` decoded as JSON; `None` when the joined text is still invalid
    pub input: Option<Value>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Joins [`ToolCallDelta`]s by index.
///
/// A call is flushed when a delta for a higher, never-seen index arrives, or when
/// [`finish`](Self::finish) is called at end of stream. Deltas for an index that
/// was already flushed are dropped with a warning.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    open: BTreeMap<u32, PartialToolCall>,
    flushed_below: Option<u32>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls still being assembled.
    pub fn pending(&self) -> usize {
        self.open.len()
    }

    /// Feed one delta; returns calls completed by its arrival.
    pub fn push(&mut self, delta: &ToolCallDelta) -> Vec<CompletedToolCall> {
        if self.flushed_below.is_some_and(|limit| delta.index < limit) {
            log::warn!(
                "Dropping tool call delta for already completed index {}",
                delta.index
            );
            return Vec::new();
        }

        let mut completed = Vec::new();
        if !self.open.contains_key(&delta.index) {
            let older: Vec<u32> = self.open.range(..delta.index).map(|(i, _)| *i).collect();
            if !older.is_empty() {
                self.flushed_below = Some(delta.index);
            }
            for index in older {
                if let Some(partial) = self.open.remove(&index) {
                    completed.extend(finalize(index, partial));
                }
            }
        }

        let entry = self.open.entry(delta.index).or_default();
        if let Some(id) = &delta.call_id {
            entry.id = Some(id.clone());
        }
        if let Some(name) = &delta.name {
            entry.name = Some(name.clone());
        }
        entry.arguments.push_str(&delta.arguments);

        completed
    }

    /// Flush every remaining call in index order.
    pub fn finish(&mut self) -> Vec<CompletedToolCall> {
        let open = std::mem::take(&mut self.open);
        if let Some(last) = open.keys().next_back() {
            self.flushed_below = Some(last + 1);
        }
        open.into_iter()
            .filter_map(|(index, partial)| finalize(index, partial))
            .collect()
    }
}

fn finalize(index: u32, partial: PartialToolCall) -> Option<CompletedToolCall> {
    let (Some(id), Some(name)) = (partial.id, partial.name) else {
        log::warn!("Dropping tool call {} without id or name", index);
        return None;
    };

    let input = decode_arguments(&partial.arguments);
    if input.is_none() {
        log::warn!("Tool call {} ({}) has invalid JSON arguments", id, name);
    }

    Some(CompletedToolCall {
        index,
        id,
        name,
        arguments: partial.arguments,
        input,
    })
}
