//! Adapts an answer stream into SSE frames.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::sse::Event;
use tokio_stream::Stream;

use docqa_chat::AnswerStream;

/// One `data:` frame per wire payload. An error event expands to two frames
/// (the error, then `[DONE]`), so this cannot be a plain `map`.
///
/// Dropping this stream drops the answer stream, which cancels generation.
pub struct SseFrames {
    events: AnswerStream,
    pending: VecDeque<String>,
}

impl SseFrames {
    pub fn new(events: AnswerStream) -> Self {
        Self {
            events,
            pending: VecDeque::new(),
        }
    }
}

impl Stream for SseFrames {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(Event::default().data(payload))));
            }
            match Pin::new(&mut self.events).poll_next(cx) {
                Poll::Ready(Some(event)) => {
                    let payloads = event.sse_payloads();
                    self.pending.extend(payloads);
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
