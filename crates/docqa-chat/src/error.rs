//! Error types for question answering.

use docqa_core::error::DocqaError;

/// Errors raised before an answer stream starts.
///
/// Failures after the stream has started are delivered in-band as
/// `StreamEvent::Error` instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("question exceeds maximum length of {0} characters")]
    QuestionTooLong(usize),
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("orchestrator is shutting down")]
    ShuttingDown,
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<DocqaError> for ChatError {
    fn from(err: DocqaError) -> Self {
        match err {
            DocqaError::IndexUnavailable(msg) => ChatError::IndexUnavailable(msg),
            other => ChatError::StorageError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyQuestion.to_string(), "question cannot be empty");
        assert_eq!(
            ChatError::QuestionTooLong(4000).to_string(),
            "question exceeds maximum length of 4000 characters"
        );
        assert_eq!(
            ChatError::ShuttingDown.to_string(),
            "orchestrator is shutting down"
        );
    }

    #[test]
    fn test_from_docqa_error() {
        let err: ChatError = DocqaError::IndexUnavailable("cold".to_string()).into();
        assert!(matches!(err, ChatError::IndexUnavailable(ref m) if m == "cold"));

        let err: ChatError = DocqaError::Storage("disk full".to_string()).into();
        assert!(matches!(err, ChatError::StorageError(ref m) if m.contains("disk full")));
    }
}
