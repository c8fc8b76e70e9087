//! Reconciles the model path and the heuristic path into one result.

use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::clients::{DisabledBackend, GeminiBackend, GenerativeBackend};
use crate::config::{Config, HeuristicConfig};
use crate::error::{InsightError, Result};
use crate::extract::extract;
use crate::features::Feature;
use crate::invoker::ModelInvoker;

const LOGGED_ERROR_CHARS: usize = 200;

/// Which path produced an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisSource {
    Model { model: String, attempts: usize },
    Heuristic { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis<T> {
    pub feature: &'static str,
    pub source: AnalysisSource,
    pub data: T,
}

impl<T> Analysis<T> {
    pub fn used_fallback(&self) -> bool {
        matches!(self.source, AnalysisSource::Heuristic { .. })
    }
}

pub struct Orchestrator {
    invoker: ModelInvoker,
    rules: HeuristicConfig,
}

impl Orchestrator {
    pub fn new(invoker: ModelInvoker, rules: HeuristicConfig) -> Self {
        Self { invoker, rules }
    }

    /// Gemini-backed orchestrator. Without an API key every run takes the heuristic path.
    pub fn from_config(config: &Config) -> Result<Self> {
        // Call timeouts are enforced by the invoker, not the HTTP client.
        let backend: Arc<dyn GenerativeBackend> =
            Arc::new(GeminiBackend::from_runtime(&config.runtime, None)?);
        Self::with_backend(backend, config)
    }

    /// Orchestrator that never calls a model.
    pub fn heuristic_only(config: &Config) -> Result<Self> {
        Self::with_backend(Arc::new(DisabledBackend), config)
    }

    pub fn with_backend(backend: Arc<dyn GenerativeBackend>, config: &Config) -> Result<Self> {
        let invoker = ModelInvoker::new(backend, config.generation.clone())?;
        Ok(Self::new(invoker, config.heuristics.clone()))
    }

    pub fn is_available(&self) -> bool {
        self.invoker.is_available()
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    pub fn rules(&self) -> &HeuristicConfig {
        &self.rules
    }

    /// Run `F`, falling back to its heuristic on any model-path failure. Never fails.
    pub async fn run<F: Feature>(&self, input: &F::Input) -> Analysis<F::Output> {
        let span = info_span!("feature", name = F::NAME);
        async move {
            if !self.invoker.is_available() {
                info!("generative backend unavailable, using heuristic fallback");
                return self.heuristic::<F>(input, "unavailable".to_string());
            }

            match self.model_path::<F>(input).await {
                Ok((model, attempts, data)) => {
                    info!(model = %model, attempts, "analysis produced by model");
                    Analysis {
                        feature: F::NAME,
                        source: AnalysisSource::Model { model, attempts },
                        data,
                    }
                }
                Err(err) => {
                    warn!(
                        error_kind = err.kind(),
                        error = %err.truncated(LOGGED_ERROR_CHARS),
                        "model path failed, using heuristic fallback"
                    );
                    self.heuristic::<F>(input, format!("{}: {}", err.kind(), err.truncated(LOGGED_ERROR_CHARS)))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn model_path<F: Feature>(
        &self,
        input: &F::Input,
    ) -> std::result::Result<(String, usize, F::Output), InsightError> {
        let pair = F::build_prompt(input, &self.rules);
        debug!(prompt_chars = pair.prompt.chars().count(), "prompt built");
        let request = self.invoker.request_for(&pair);
        let generation = self.invoker.invoke(&request).await?;
        let output = extract::<F::Output>(Some(&generation.text))?;
        Ok((
            generation.model,
            generation.attempts,
            F::finalize(input, output),
        ))
    }

    fn heuristic<F: Feature>(&self, input: &F::Input, reason: String) -> Analysis<F::Output> {
        Analysis {
            feature: F::NAME,
            source: AnalysisSource::Heuristic { reason },
            data: F::fallback(input, &self.rules),
        }
    }
}
