//! Error types for the analytics engine.

use thiserror::Error;

/// Main error type for analysis operations.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A column role (date, metric, category, store) could not be resolved.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The schema was valid but no usable data points remained after
    /// filtering or aggregation.
    #[error("No data: {0}")]
    EmptyResult(String),

    /// No dataset file exists for the requested session.
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// A dataset file exists but could not be loaded (unsupported format,
    /// empty file, corrupt contents).
    #[error("Dataset load error: {0}")]
    DatasetLoad(String),

    /// Malformed caller input (bad session id, out-of-range bins/top_n,
    /// invalid enum value).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Persistence layer failure. Callers computing an analysis response
    /// log these and continue rather than propagating them.
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AnalysisError {
    /// Whether this error maps to a caller mistake (4xx-equivalent) rather
    /// than an internal failure. User errors carry sanitized messages safe
    /// to surface; everything else should be logged in full and reported
    /// generically by the boundary layer.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::Schema(_)
                | AnalysisError::EmptyResult(_)
                | AnalysisError::DatasetNotFound(_)
                | AnalysisError::Validation(_)
        )
    }

    /// Short stable code for the wire contract with the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::Schema(_) => "SCHEMA_ERROR",
            AnalysisError::EmptyResult(_) => "EMPTY_RESULT",
            AnalysisError::DatasetNotFound(_) => "SESSION_NOT_FOUND",
            AnalysisError::DatasetLoad(_) => "DATASET_LOAD_ERROR",
            AnalysisError::Validation(_) => "VALIDATION_ERROR",
            AnalysisError::Database(_) => "DATABASE_ERROR",
            AnalysisError::Config(_) => "CONFIG_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Message with path fragments and line breaks removed, suitable for a
    /// user-facing error payload.
    pub fn sanitized_message(&self) -> String {
        let cleaned = self
            .to_string()
            .replace("..", "")
            .replace('\\', "")
            .replace('\n', " ")
            .replace('\r', " ");
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            "Unhandled error occurred".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_classification() {
        assert!(AnalysisError::Validation("bad bins".into()).is_user_error());
        assert!(AnalysisError::Schema("no date column".into()).is_user_error());
        assert!(AnalysisError::EmptyResult("no rows".into()).is_user_error());
        assert!(AnalysisError::DatasetNotFound("session_x".into()).is_user_error());
        assert!(!AnalysisError::Database("locked".into()).is_user_error());
    }

    #[test]
    fn test_sanitized_message_strips_traversal_and_newlines() {
        let err = AnalysisError::DatasetLoad("failed\nat ..\\uploads".into());
        let msg = err.sanitized_message();
        assert!(!msg.contains(".."));
        assert!(!msg.contains('\\'));
        assert!(!msg.contains('\n'));
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            AnalysisError::Validation(String::new()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            AnalysisError::DatasetNotFound(String::new()).code(),
            "SESSION_NOT_FOUND"
        );
        assert_eq!(
            AnalysisError::EmptyResult(String::new()).code(),
            "EMPTY_RESULT"
        );
    }
}
