//! Domain-specific error types for hrms-insight

use thiserror::Error;

use crate::clients::BackendError;

/// Main error type for the insight adapter.
///
/// Everything below the orchestrator speaks this type; the orchestrator is the
/// only place that turns it into a heuristic result.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Generative backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("All {attempted} model candidates failed; last error: {}", describe_last(.last))]
    AllCandidatesExhausted {
        attempted: usize,
        last: Option<BackendError>,
    },

    #[error("Model {model} failed with a non-retryable error: {source}")]
    NonRetryableGenerationFailure {
        model: String,
        #[source]
        source: BackendError,
    },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Model response is not valid JSON ({reason}); preview: {preview}")]
    MalformedResponse { preview: String, reason: String },

    #[error("Model response does not match the expected shape: {message}")]
    SchemaMismatch { message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("HTTP error: {message}")]
    Http { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn describe_last(last: &Option<BackendError>) -> String {
    match last {
        Some(err) => err.to_string(),
        None => "no error captured".to_string(),
    }
}

impl InsightError {
    /// Display string cut to `max` characters, for log lines.
    pub fn truncated(&self, max: usize) -> String {
        let full = self.to_string();
        if full.chars().count() <= max {
            return full;
        }
        let mut cut: String = full.chars().take(max).collect();
        cut.push('…');
        cut
    }

    /// Short machine-friendly label for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            InsightError::Config { .. } => "config",
            InsightError::Unavailable { .. } => "unavailable",
            InsightError::AllCandidatesExhausted { .. } => "all_candidates_exhausted",
            InsightError::NonRetryableGenerationFailure { .. } => "non_retryable_generation_failure",
            InsightError::EmptyResponse => "empty_response",
            InsightError::MalformedResponse { .. } => "malformed_response",
            InsightError::SchemaMismatch { .. } => "schema_mismatch",
            InsightError::Timeout { .. } => "timeout",
            InsightError::Http { .. } => "http",
            InsightError::Serialization { .. } => "serialization",
            InsightError::Internal { .. } => "internal",
        }
    }
}

impl From<anyhow::Error> for InsightError {
    fn from(err: anyhow::Error) -> Self {
        InsightError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for InsightError {
    fn from(err: reqwest::Error) -> Self {
        InsightError::Http {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for InsightError {
    fn from(err: toml::de::Error) -> Self {
        InsightError::Config {
            message: format!("invalid TOML: {}", err),
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, InsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_display_with_last() {
        let err = InsightError::AllCandidatesExhausted {
            attempted: 3,
            last: Some(BackendError::Other {
                message: "429 Quota exceeded".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("All 3 model candidates failed"));
        assert!(msg.contains("429 Quota exceeded"));
    }

    #[test]
    fn test_exhausted_display_without_last() {
        let err = InsightError::AllCandidatesExhausted {
            attempted: 0,
            last: None,
        };
        assert!(err.to_string().ends_with("no error captured"));
    }

    #[test]
    fn test_truncated_keeps_short_messages() {
        let err = InsightError::EmptyResponse;
        assert_eq!(err.truncated(200), "Model returned an empty response");
    }

    #[test]
    fn test_truncated_cuts_on_char_boundary() {
        let err = InsightError::Internal {
            message: "خطأ".repeat(100),
        };
        let cut = err.truncated(20);
        assert_eq!(cut.chars().count(), 21);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("not = [valid");
        let err: InsightError = parsed.unwrap_err().into();
        assert_eq!(err.kind(), "config");
    }
}
