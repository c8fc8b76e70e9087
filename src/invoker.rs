//! Ordered model-candidate invocation.
//!
//! Candidates are tried strictly in sequence and the first non-empty answer
//! wins. Quota and model-not-found failures move on to the next candidate;
//! anything else stops the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clients::{BackendError, FailureKind, GenerationRequest, GenerativeBackend};
use crate::config::GenerationConfig;
use crate::error::{InsightError, Result};
use crate::features::PromptPair;

/// Text produced by one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub model: String,
    pub text: String,
    /// Backend calls made, across all candidates and retries
    pub attempts: usize,
}

pub struct ModelInvoker {
    backend: Arc<dyn GenerativeBackend>,
    settings: GenerationConfig,
}

impl ModelInvoker {
    pub fn new(backend: Arc<dyn GenerativeBackend>, settings: GenerationConfig) -> Result<Self> {
        if settings.candidates.is_empty() {
            return Err(InsightError::Config {
                message: "at least one model candidate is required".to_string(),
            });
        }
        Ok(Self { backend, settings })
    }

    pub fn candidates(&self) -> &[String] {
        &self.settings.candidates
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// True when the backend has a credential. No network call.
    pub fn is_available(&self) -> bool {
        self.backend.is_configured()
    }

    /// Build a request for `pair` with the configured sampling.
    pub fn request_for(&self, pair: &PromptPair) -> GenerationRequest {
        GenerationRequest::new(pair.prompt.clone(), &self.settings)
            .with_system_instruction(pair.system_instruction.clone())
    }

    pub async fn invoke(&self, request: &GenerationRequest) -> Result<Generation> {
        if !self.is_available() {
            return Err(InsightError::Unavailable {
                message: format!("{} backend has no credential", self.backend.name()),
            });
        }

        let started = Instant::now();
        let mut attempts = 0usize;
        let mut last: Option<BackendError> = None;

        for model in &self.settings.candidates {
            let mut retries_left = self.settings.transient_retries;
            loop {
                attempts += 1;
                debug!(model = %model, attempt = attempts, "invoking model candidate");

                match self.attempt(model, request, started).await? {
                    Ok(text) if !text.trim().is_empty() => {
                        info!(model = %model, attempts, "model candidate answered");
                        return Ok(Generation {
                            model: model.clone(),
                            text,
                            attempts,
                        });
                    }
                    Ok(_) => {
                        warn!(model = %model, "empty answer, trying next candidate");
                        last = Some(BackendError::Other {
                            message: format!("{} returned an empty response", model),
                        });
                        break;
                    }
                    Err(err) => match err.kind() {
                        FailureKind::QuotaExhausted | FailureKind::ModelNotFound => {
                            warn!(model = %model, error = %err, "retryable failure, trying next candidate");
                            last = Some(err);
                            break;
                        }
                        FailureKind::Transient if retries_left > 0 => {
                            let round = self.settings.transient_retries - retries_left;
                            retries_left -= 1;
                            warn!(model = %model, error = %err, retries_left, "transient failure, retrying candidate");
                            let backoff = self.settings.retry_backoff_ms.saturating_mul(1u64 << round.min(6));
                            if backoff > 0 {
                                tokio::time::sleep(Duration::from_millis(backoff)).await;
                            }
                        }
                        _ => {
                            warn!(model = %model, error = %err, "non-retryable failure, aborting candidate loop");
                            return Err(InsightError::NonRetryableGenerationFailure {
                                model: model.clone(),
                                source: err,
                            });
                        }
                    },
                }
            }
        }

        Err(InsightError::AllCandidatesExhausted {
            attempted: self.settings.candidates.len(),
            last,
        })
    }

    /// One backend call bounded by the per-call timeout and what is left of the deadline.
    async fn attempt(
        &self,
        model: &str,
        request: &GenerationRequest,
        started: Instant,
    ) -> Result<std::result::Result<String, BackendError>> {
        let remaining = self
            .settings
            .deadline()
            .map(|d| d.saturating_sub(started.elapsed()));
        if remaining.is_some_and(|r| r.is_zero()) {
            return Err(self.deadline_error());
        }

        let (limit, bound_by_deadline) = match (self.settings.call_timeout(), remaining) {
            (Some(call), Some(rest)) if rest < call => (Some(rest), true),
            (Some(call), _) => (Some(call), false),
            (None, Some(rest)) => (Some(rest), true),
            (None, None) => (None, false),
        };

        let call = self.backend.generate(model, request);
        let Some(limit) = limit else {
            return Ok(call.await);
        };

        match tokio::time::timeout(limit, call).await {
            Ok(outcome) => Ok(outcome),
            Err(_) if bound_by_deadline => Err(self.deadline_error()),
            Err(_) => Ok(Err(BackendError::Transport {
                message: format!("{} did not answer within {}ms", model, limit.as_millis()),
                timed_out: true,
            })),
        }
    }

    fn deadline_error(&self) -> InsightError {
        InsightError::Timeout {
            operation: "model candidate loop".to_string(),
            timeout_ms: self.settings.deadline_ms,
        }
    }
}
