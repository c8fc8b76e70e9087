use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::GenerationConfig;

/// One generation call, built per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, sampling: &GenerationConfig) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: None,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            max_output_tokens: sampling.max_output_tokens,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = if instruction.trim().is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }
}

/// How a backend failure should steer the candidate loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    QuotaExhausted,
    ModelNotFound,
    Transient,
    Fatal,
}

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Non-success HTTP answer, with the backend's structured status when it sent one.
    #[error("HTTP {code}{}: {message}", status_suffix(.status))]
    Status {
        code: u16,
        status: Option<String>,
        message: String,
    },
    #[error("transport error: {message}")]
    Transport { message: String, timed_out: bool },
    #[error("API key not configured for {backend}")]
    MissingCredential { backend: String },
    /// Free-text failure without a structured code.
    #[error("{message}")]
    Other { message: String },
}

fn status_suffix(status: &Option<String>) -> String {
    status
        .as_deref()
        .map(|s| format!(" {}", s))
        .unwrap_or_default()
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::Status { code, status, .. } => {
                classify_status(*code, status.as_deref())
            }
            BackendError::Transport { .. } => FailureKind::Transient,
            BackendError::MissingCredential { .. } => FailureKind::Fatal,
            BackendError::Other { message } => message_shim::classify(message),
        }
    }

    /// Quota and model-not-found failures move the loop on to the next candidate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::QuotaExhausted | FailureKind::ModelNotFound
        )
    }
}

fn classify_status(code: u16, status: Option<&str>) -> FailureKind {
    match (code, status) {
        (429, _) | (_, Some("RESOURCE_EXHAUSTED")) => FailureKind::QuotaExhausted,
        (404, _) | (_, Some("NOT_FOUND")) => FailureKind::ModelNotFound,
        (500..=599, _) | (_, Some("UNAVAILABLE")) | (_, Some("DEADLINE_EXCEEDED")) => {
            FailureKind::Transient
        }
        _ => FailureKind::Fatal,
    }
}

/// Compatibility path for backends that only hand back a message string.
mod message_shim {
    use super::FailureKind;

    pub(super) fn classify(message: &str) -> FailureKind {
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("quota") || lower.contains("rate limit") {
            FailureKind::QuotaExhausted
        } else if lower.contains("404") || lower.contains("not found") {
            FailureKind::ModelNotFound
        } else {
            FailureKind::Fatal
        }
    }
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Whether a credential is present. Must not touch the network.
    fn is_configured(&self) -> bool;

    /// Run one generation against `model` and return the raw text.
    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<String, BackendError>;
}

/// Backend used when the AI path is switched off for the whole process.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBackend;

#[async_trait]
impl GenerativeBackend for DisabledBackend {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _model: &str,
        _request: &GenerationRequest,
    ) -> Result<String, BackendError> {
        Err(BackendError::MissingCredential {
            backend: self.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, status: Option<&str>) -> BackendError {
        BackendError::Status {
            code,
            status: status.map(str::to_string),
            message: "boom".into(),
        }
    }

    #[test]
    fn test_structured_codes_classify() {
        assert_eq!(status(429, None).kind(), FailureKind::QuotaExhausted);
        assert_eq!(
            status(400, Some("RESOURCE_EXHAUSTED")).kind(),
            FailureKind::QuotaExhausted
        );
        assert_eq!(status(404, Some("NOT_FOUND")).kind(), FailureKind::ModelNotFound);
        assert_eq!(status(503, None).kind(), FailureKind::Transient);
        assert_eq!(status(403, Some("PERMISSION_DENIED")).kind(), FailureKind::Fatal);
        assert_eq!(status(400, Some("INVALID_ARGUMENT")).kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_message_shim_classifies_free_text() {
        let quota = BackendError::Other {
            message: "429 Quota exceeded".into(),
        };
        let missing = BackendError::Other {
            message: "404 model not found".into(),
        };
        let other = BackendError::Other {
            message: "socket hang up".into(),
        };
        assert!(quota.is_retryable());
        assert!(missing.is_retryable());
        assert!(!other.is_retryable());
        assert_eq!(other.kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_transport_is_transient_not_retryable() {
        let err = BackendError::Transport {
            message: "connection reset".into(),
            timed_out: false,
        };
        assert_eq!(err.kind(), FailureKind::Transient);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_display_includes_status() {
        assert_eq!(
            status(429, Some("RESOURCE_EXHAUSTED")).to_string(),
            "HTTP 429 RESOURCE_EXHAUSTED: boom"
        );
        assert_eq!(status(500, None).to_string(), "HTTP 500: boom");
    }

    #[test]
    fn test_blank_system_instruction_is_dropped() {
        let request = GenerationRequest::new("p", &GenerationConfig::default())
            .with_system_instruction("   ");
        assert!(request.system_instruction.is_none());
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.top_p, 0.8);
        assert_eq!(request.max_output_tokens, 2048);
    }

    #[tokio::test]
    async fn test_disabled_backend_is_never_configured() {
        let backend = DisabledBackend;
        assert!(!backend.is_configured());
        let request = GenerationRequest::new("p", &GenerationConfig::default());
        let err = backend.generate("m", &request).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Fatal);
    }
}
