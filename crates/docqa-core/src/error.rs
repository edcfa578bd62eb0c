use thiserror::Error;

/// Top-level error type for the docqa system.
///
/// Subsystem crates either return this type directly or define their own
/// error enums with a `From<DocqaError>` conversion so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocqaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// No snapshot has been built yet; queries cannot be answered.
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The snapshot could not be written; the previous snapshot is intact.
    #[error("Snapshot persist failed: {0}")]
    PersistFailure(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<toml::de::Error> for DocqaError {
    fn from(err: toml::de::Error) -> Self {
        DocqaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DocqaError {
    fn from(err: toml::ser::Error) -> Self {
        DocqaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DocqaError {
    fn from(err: serde_json::Error) -> Self {
        DocqaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for docqa operations.
pub type Result<T> = std::result::Result<T, DocqaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(DocqaError, &str)> = vec![
            (
                DocqaError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                DocqaError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                DocqaError::NotFound("document 42".to_string()),
                "Not found: document 42",
            ),
            (
                DocqaError::IndexUnavailable("no snapshot".to_string()),
                "Vector index unavailable: no snapshot",
            ),
            (
                DocqaError::PersistFailure("rename failed".to_string()),
                "Snapshot persist failed: rename failed",
            ),
            (
                DocqaError::Embedding("model offline".to_string()),
                "Embedding error: model offline",
            ),
            (
                DocqaError::Generation("stream reset".to_string()),
                "Generation error: stream reset",
            ),
            (
                DocqaError::InvalidInput("empty".to_string()),
                "Invalid input: empty",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DocqaError = io_err.into();
        match &err {
            DocqaError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io variant"),
        }
        assert!(err.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: DocqaError = err.unwrap_err().into();
        assert!(matches!(err, DocqaError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: DocqaError = err.unwrap_err().into();
        assert!(matches!(err, DocqaError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
