//! Streaming answer events and their server-sent-event wire encoding.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::CitedSnippet;

/// Payload of the frame that ends every answer stream.
pub const DONE_PAYLOAD: &str = "[DONE]";

/// One event of an answer stream.
///
/// A stream carries zero or more `Token`s, then at most one `Sources`, then
/// exactly one terminal (`Done` or `Error`). Nothing follows the terminal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    Token(String),
    Sources(Vec<CitedSnippet>),
    Done,
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }

    /// The `data:` payloads this event produces on the wire, in order.
    ///
    /// An error is followed by the done marker so clients that only watch
    /// for `[DONE]` still stop reading.
    pub fn sse_payloads(&self) -> Vec<String> {
        match self {
            StreamEvent::Token(text) => {
                vec![json!({ "choices": [{ "delta": { "content": text } }] }).to_string()]
            }
            StreamEvent::Sources(sources) => vec![json!({ "sources": sources }).to_string()],
            StreamEvent::Done => vec![DONE_PAYLOAD.to_string()],
            StreamEvent::Error(message) => vec![
                json!({ "error": message }).to_string(),
                DONE_PAYLOAD.to_string(),
            ],
        }
    }

    /// Full SSE frames (`data: <payload>\n\n`) for this event.
    pub fn to_sse_frames(&self) -> String {
        self.sse_payloads()
            .into_iter()
            .map(|payload| format!("data: {}\n\n", payload))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_frame() {
        let frames = StreamEvent::Token("Hel".to_string()).to_sse_frames();
        assert_eq!(
            frames,
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n"
        );
    }

    #[test]
    fn test_token_escaping() {
        let payloads = StreamEvent::Token("say \"hi\"\n".to_string()).sse_payloads();
        let value: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(value["choices"][0]["delta"]["content"], "say \"hi\"\n");
    }

    #[test]
    fn test_sources_frame() {
        let event = StreamEvent::Sources(vec![CitedSnippet {
            page_content: "Rust is fast".to_string(),
            source: "/books/rust.pdf".to_string(),
            page: 2,
        }]);
        let payloads = event.sse_payloads();
        assert_eq!(payloads.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(value["sources"][0]["page_content"], "Rust is fast");
        assert_eq!(value["sources"][0]["source"], "/books/rust.pdf");
        assert_eq!(value["sources"][0]["page"], 2);
    }

    #[test]
    fn test_done_frame() {
        assert_eq!(StreamEvent::Done.to_sse_frames(), "data: [DONE]\n\n");
    }

    #[test]
    fn test_error_frame_ends_with_done() {
        let frames = StreamEvent::Error("model crashed".to_string()).to_sse_frames();
        assert_eq!(
            frames,
            "data: {\"error\":\"model crashed\"}\n\ndata: [DONE]\n\n"
        );
    }

    #[test]
    fn test_is_terminal() {
        assert!(StreamEvent::Done.is_terminal());
        assert!(StreamEvent::Error("x".into()).is_terminal());
        assert!(!StreamEvent::Token("x".into()).is_terminal());
        assert!(!StreamEvent::Sources(vec![]).is_terminal());
    }
}
