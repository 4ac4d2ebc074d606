//! Stream adapter: one event sequence for every body shape.
//!
//! [`adapt`] inspects the [`ResponseBody`] once and returns an [`EventStream`], a
//! lazy, single-pass, finite stream of [`NormalizedEvent`]s:
//!
//! | Body | Behavior |
//! |------|----------|
//! | Push | frames decoded and yielded as chunks arrive; waits on the channel when idle |
//! | Pull | reader drained to one buffer (cancellation checked between reads), then emitted as a burst |
//! | Buffered | value coerced to text, then handled like a drained pull body |
//!
//! Cancellation is checked while waiting and before every yielded event. Once it is
//! observed the stream ends: no further events, no error. Events already yielded
//! stay yielded.
//!
//! A push source's error is yielded as a final `Err` after the events decoded
//! from earlier chunks; a pull reader's I/O error is yielded the same way and
//! nothing from the partial buffer is emitted.

use crate::interpret::ChunkInterpreter;
use crate::sse::{DecoderState, SseDecoder};
use crate::transport::{FallbackBody, PushSource, ResponseBody, SourceEvent};
use crate::types::NormalizedEvent;
use crate::{Error, Result};
use futures::stream::Stream;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

/// Stream of normalized events for one request.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<NormalizedEvent>> + Send>>;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Per-request decode state, owned by the stream for its whole life.
#[derive(Debug)]
struct StreamState {
    decoder: SseDecoder,
    interpreter: ChunkInterpreter,
    cancel: CancellationToken,
    emitted: usize,
}

impl StreamState {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            decoder: SseDecoder::new(),
            interpreter: ChunkInterpreter::new(),
            cancel,
            emitted: 0,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn events_for(&mut self, frames: Vec<String>) -> Vec<NormalizedEvent> {
        frames
            .iter()
            .flat_map(|frame| self.interpreter.interpret_frame(frame))
            .collect()
    }

    /// Decode a complete body: every frame, trailing remainder included.
    fn events_for_buffer(&mut self, buffer: &[u8]) -> Vec<NormalizedEvent> {
        log::debug!("Processing buffer, length: {}", buffer.len());
        let mut frames = self.decoder.push(buffer);
        frames.extend(self.decoder.finish());
        self.events_for(frames)
    }

    fn log_summary(&self, kind: &str) {
        if self.is_cancelled() {
            log::info!(
                "Streaming cancelled ({}): {} events emitted",
                kind,
                self.emitted
            );
        } else {
            log::info!(
                "Streaming complete ({}): {} events, {} frames, {} skipped",
                kind,
                self.emitted,
                self.interpreter.frames_seen(),
                self.interpreter.skipped_frames()
            );
        }
    }
}

/// Build the event stream for a response body.
pub fn adapt(body: ResponseBody, cancel: CancellationToken) -> EventStream {
    log::debug!("Adapting {} response body", body.kind());
    match body {
        ResponseBody::Push(source) => push_events(source, cancel),
        ResponseBody::Pull(reader) => pull_events(reader, cancel),
        ResponseBody::Buffered(value) => fallback_events(value, cancel),
    }
}

fn push_events(mut source: PushSource, cancel: CancellationToken) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut state = StreamState::new(cancel);

        'stream: loop {
            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => None,
                event = source.next_event() => Some(event),
            };
            let Some(event) = next else {
                break 'stream;
            };

            let frames = match event {
                Some(SourceEvent::Data(chunk)) => state.decoder.push(&chunk),
                Some(SourceEvent::End) | None => state.decoder.finish().into_iter().collect(),
                Some(SourceEvent::Error(message)) => {
                    log::error!("Error in streaming: {}", message);
                    yield Err(Error::stream(message));
                    break 'stream;
                }
            };

            for event in state.events_for(frames) {
                if state.is_cancelled() {
                    break 'stream;
                }
                state.emitted += 1;
                yield Ok(event);
            }

            if state.decoder.state() == DecoderState::Drained {
                break 'stream;
            }
        }

        state.log_summary("push");
    })
}

fn pull_events(mut reader: Box<dyn AsyncRead + Send + Unpin>, cancel: CancellationToken) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut state = StreamState::new(cancel);
        let mut buffer = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut drained = false;

        loop {
            let read = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => None,
                read = reader.read(&mut chunk) => Some(read),
            };
            match read {
                None => break,
                Some(Ok(0)) => {
                    drained = true;
                    break;
                }
                Some(Ok(n)) => buffer.extend_from_slice(&chunk[..n]),
                Some(Err(e)) => {
                    log::error!("Error reading response body: {}", e);
                    yield Err(Error::Io(e));
                    break;
                }
            }
        }
        // Release the reader before the synchronous burst
        drop(reader);

        if drained {
            for event in state.events_for_buffer(&buffer) {
                if state.is_cancelled() {
                    break;
                }
                state.emitted += 1;
                yield Ok(event);
            }
        }

        state.log_summary("pull");
    })
}

fn fallback_events(value: FallbackBody, cancel: CancellationToken) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut state = StreamState::new(cancel);
        let text = value.into_text().unwrap_or_default();

        for event in state.events_for_buffer(text.as_bytes()) {
            if state.is_cancelled() {
                break;
            }
            state.emitted += 1;
            yield Ok(event);
        }

        state.log_summary("buffered");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::push_channel;
    use futures::StreamExt;

    const HELLO: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n";

    async fn collect(stream: EventStream) -> Vec<Result<NormalizedEvent>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_push_split_inside_frame() {
        let (emitter, source) = push_channel();
        emitter.data("data: {\"choices\":[{\"delta\":{\"content\":\"He");
        emitter.data("llo\"}}]}\n\n");
        emitter.data("data: [DONE]\n\n");
        emitter.end();

        let events = collect(adapt(ResponseBody::Push(source), CancellationToken::new())).await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &NormalizedEvent::TextDelta("Hello".to_string())
        );
    }

    #[tokio::test]
    async fn test_push_flushes_unterminated_final_frame() {
        let (emitter, source) = push_channel();
        emitter.data(HELLO.trim_end().to_string());
        drop(emitter);

        let events = collect(adapt(ResponseBody::Push(source), CancellationToken::new())).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[tokio::test]
    async fn test_push_error_after_data() {
        let (emitter, source) = push_channel();
        emitter.data(HELLO);
        emitter.error("socket closed");

        let events = collect(adapt(ResponseBody::Push(source), CancellationToken::new())).await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(&events[1], Err(Error::Stream(m)) if m == "socket closed"));
    }

    #[tokio::test]
    async fn test_push_waits_for_late_chunks() {
        let (emitter, source) = push_channel();
        let producer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            emitter.data(HELLO);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            emitter.end();
        });

        let events = collect(adapt(ResponseBody::Push(source), CancellationToken::new())).await;
        producer.await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_pull_body_burst() {
        let body = format!("{}data: {{bad json}}\n\n{}data: [DONE]\n\n", HELLO, HELLO);
        let reader = std::io::Cursor::new(body.into_bytes());

        let events = collect(adapt(ResponseBody::pull(reader), CancellationToken::new())).await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.is_ok()));
    }

    #[tokio::test]
    async fn test_pull_cancelled_before_drain_yields_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reader = std::io::Cursor::new(HELLO.as_bytes().to_vec());

        let events = collect(adapt(ResponseBody::pull(reader), cancel)).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_buffered_text_and_bytes() {
        let events = collect(adapt(ResponseBody::text(HELLO), CancellationToken::new())).await;
        assert_eq!(events.len(), 1);

        let events = collect(adapt(
            ResponseBody::bytes(HELLO.as_bytes().to_vec()),
            CancellationToken::new(),
        ))
        .await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_opaque_fallback_yields_nothing() {
        let events = collect(adapt(
            ResponseBody::Buffered(FallbackBody::Opaque),
            CancellationToken::new(),
        ))
        .await;
        assert!(events.is_empty());
    }
}
