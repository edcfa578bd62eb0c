//! Generation engine seam and the built-in extractive engine.
//!
//! An engine receives the question, the retrieved context and the session
//! memory, pushes tokens into a `TokenSink` as they are produced, and
//! returns the full answer when done.

use async_trait::async_trait;
use tokio::sync::mpsc;

use docqa_core::error::{DocqaError, Result};
use docqa_core::types::{CitedSnippet, HistoryPair};

/// Everything an engine needs to answer one question.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub question: String,
    /// Retrieved chunks, best first.
    pub context: Vec<CitedSnippet>,
    /// Prior exchanges, oldest first.
    pub history: Vec<HistoryPair>,
}

impl GenerationRequest {
    /// Render a single prompt for engines that take plain text.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::from(
            "Answer the question using only the context below. \
             If the context does not contain the answer, say so.\n\n",
        );
        if !self.history.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for pair in &self.history {
                prompt.push_str(&format!("User: {}\nAssistant: {}\n", pair.question, pair.answer));
            }
            prompt.push('\n');
        }
        prompt.push_str("Context:\n");
        for (i, snippet) in self.context.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] {} (page {}):\n{}\n",
                i + 1,
                snippet.source,
                snippet.page + 1,
                snippet.page_content
            ));
        }
        prompt.push_str(&format!("\nQuestion: {}\nAnswer:", self.question));
        prompt
    }
}

/// Producer end of a request's bounded token queue.
#[derive(Debug, Clone)]
pub struct TokenSink {
    tx: mpsc::Sender<String>,
}

impl TokenSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Queue a token, waiting while the queue is full. Fails once the
    /// consumer has gone away.
    pub async fn send(&self, token: impl Into<String>) -> Result<()> {
        self.tx
            .send(token.into())
            .await
            .map_err(|_| DocqaError::Generation("token stream closed".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A streaming answer generator.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Produce an answer, sending tokens into `sink` as they become
    /// available. The returned string is the complete answer.
    async fn generate(&self, request: &GenerationRequest, sink: &TokenSink) -> Result<String>;
}

// =============================================================================
// ExtractiveGeneration
// =============================================================================

/// Answers by quoting the best retrieved passages.
///
/// Needs no model, which keeps the service usable offline and gives tests a
/// deterministic engine. Tokens are emitted word by word.
#[derive(Debug, Clone)]
pub struct ExtractiveGeneration {
    max_passages: usize,
    max_passage_chars: usize,
}

impl Default for ExtractiveGeneration {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ExtractiveGeneration {
    pub fn new(max_passages: usize) -> Self {
        Self {
            max_passages: max_passages.max(1),
            max_passage_chars: 300,
        }
    }

    /// Compose the full answer text for a request.
    pub fn compose(&self, request: &GenerationRequest) -> String {
        let limited = &request.context[..request.context.len().min(self.max_passages)];
        match limited {
            [] => "I could not find anything about that in your documents.".to_string(),
            [only] => format!(
                "According to {} (page {}): {}",
                display_name(&only.source),
                only.page + 1,
                self.excerpt(&only.page_content)
            ),
            many => {
                let mut answer = String::from("Here is what your documents say:");
                for snippet in many {
                    answer.push_str(&format!(
                        "\n- {} (page {}): {}",
                        display_name(&snippet.source),
                        snippet.page + 1,
                        self.excerpt(&snippet.page_content)
                    ));
                }
                answer
            }
        }
    }

    fn excerpt(&self, text: &str) -> String {
        let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= self.max_passage_chars {
            flat
        } else {
            let head: String = flat.chars().take(self.max_passage_chars).collect();
            format!("{}...", head.trim_end())
        }
    }
}

#[async_trait]
impl GenerationEngine for ExtractiveGeneration {
    async fn generate(&self, request: &GenerationRequest, sink: &TokenSink) -> Result<String> {
        let answer = self.compose(request);
        for token in answer.split_inclusive(' ') {
            sink.send(token).await?;
        }
        Ok(answer)
    }
}

/// File name of a source path, or the whole source if it has none.
fn display_name(source: &str) -> &str {
    std::path::Path::new(source)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(source: &str, page: u32, text: &str) -> CitedSnippet {
        CitedSnippet {
            page_content: text.to_string(),
            source: source.to_string(),
            page,
        }
    }

    fn request(context: Vec<CitedSnippet>) -> GenerationRequest {
        GenerationRequest {
            question: "What is ownership?".to_string(),
            context,
            history: Vec::new(),
        }
    }

    #[test]
    fn test_compose_no_context() {
        let answer = ExtractiveGeneration::default().compose(&request(vec![]));
        assert!(answer.contains("could not find"));
    }

    #[test]
    fn test_compose_single_passage() {
        let answer = ExtractiveGeneration::default().compose(&request(vec![snippet(
            "/books/rust.pdf",
            0,
            "Each value has\n an owner.",
        )]));
        assert_eq!(answer, "According to rust.pdf (page 1): Each value has an owner.");
    }

    #[test]
    fn test_compose_limits_passages() {
        let context = (0..5)
            .map(|i| snippet("/books/rust.pdf", i, &format!("passage {}", i)))
            .collect();
        let answer = ExtractiveGeneration::new(2).compose(&request(context));
        assert!(answer.starts_with("Here is what your documents say:"));
        assert!(answer.contains("passage 0"));
        assert!(answer.contains("passage 1"));
        assert!(!answer.contains("passage 2"));
    }

    #[test]
    fn test_excerpt_truncates() {
        let engine = ExtractiveGeneration::default();
        let long = "word ".repeat(200);
        let excerpt = engine.excerpt(&long);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= 303);
    }

    #[tokio::test]
    async fn test_generate_streams_tokens_that_rebuild_answer() {
        let (tx, mut rx) = mpsc::channel(64);
        let sink = TokenSink::new(tx);
        let engine = ExtractiveGeneration::default();
        let req = request(vec![snippet("/books/rust.pdf", 2, "Values are dropped at scope end.")]);

        let answer = engine.generate(&req, &sink).await.unwrap();
        drop(sink);

        let mut streamed = String::new();
        while let Some(token) = rx.recv().await {
            streamed.push_str(&token);
        }
        assert_eq!(streamed, answer);
    }

    #[tokio::test]
    async fn test_sink_fails_when_consumer_gone() {
        let (tx, rx) = mpsc::channel(1);
        let sink = TokenSink::new(tx);
        drop(rx);
        assert!(sink.is_closed());
        assert!(matches!(sink.send("x").await, Err(DocqaError::Generation(_))));
    }

    #[test]
    fn test_render_prompt_includes_history_and_context() {
        let mut req = request(vec![snippet("/books/rust.pdf", 0, "Ownership text")]);
        req.history.push(HistoryPair {
            question: "earlier q".to_string(),
            answer: "earlier a".to_string(),
        });
        let prompt = req.render_prompt();
        assert!(prompt.contains("User: earlier q\nAssistant: earlier a"));
        assert!(prompt.contains("[1] /books/rust.pdf (page 1):\nOwnership text"));
        assert!(prompt.ends_with("Question: What is ownership?\nAnswer:"));
    }
}
