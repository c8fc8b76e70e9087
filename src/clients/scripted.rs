//! Deterministic in-memory backend for tests.
//!
//! Replays queued outcomes per model and records every attempted model, so the
//! candidate loop and the orchestrator can be exercised without a network.
//! It is public only so integration tests and downstream crates can drive the
//! orchestrator offline; production code should use [`GeminiBackend`] or
//! [`DisabledBackend`].
//!
//! [`GeminiBackend`]: crate::clients::GeminiBackend
//! [`DisabledBackend`]: crate::clients::DisabledBackend

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::traits::{BackendError, GenerationRequest, GenerativeBackend};

type Outcome = Result<String, BackendError>;

#[derive(Default)]
struct Script {
    outcomes: HashMap<String, VecDeque<Outcome>>,
    delays: HashMap<String, Duration>,
    attempts: Vec<String>,
    requests: Vec<GenerationRequest>,
}

/// Test double that never reaches the network. Reports a credential unless
/// built with [`ScriptedBackend::unconfigured`].
pub struct ScriptedBackend {
    configured: bool,
    script: Mutex<Script>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            configured: true,
            script: Mutex::new(Script::default()),
        }
    }

    /// A backend that reports no credential.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            script: Mutex::new(Script::default()),
        }
    }

    pub fn respond(self, model: &str, text: impl Into<String>) -> Self {
        self.push(model, Ok(text.into()))
    }

    /// Queue a free-text failure (classified through the message shim).
    pub fn fail(self, model: &str, message: impl Into<String>) -> Self {
        self.push(
            model,
            Err(BackendError::Other {
                message: message.into(),
            }),
        )
    }

    pub fn fail_with(self, model: &str, error: BackendError) -> Self {
        self.push(model, Err(error))
    }

    /// Sleep before answering for `model`.
    pub fn delay(self, model: &str, delay: Duration) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.delays.insert(model.to_string(), delay);
        }
        self
    }

    fn push(self, model: &str, outcome: Outcome) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script
                .outcomes
                .entry(model.to_string())
                .or_default()
                .push_back(outcome);
        }
        self
    }

    /// Models in the order they were attempted.
    pub fn attempts(&self) -> Vec<String> {
        self.script
            .lock()
            .map(|s| s.attempts.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().map(|s| s.attempts.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.script
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, model: &str, request: &GenerationRequest) -> Outcome {
        let (delay, outcome) = {
            let mut script = self.script.lock().map_err(|_| BackendError::Other {
                message: "scripted backend lock poisoned".to_string(),
            })?;
            script.attempts.push(model.to_string());
            script.requests.push(request.clone());
            let delay = script.delays.get(model).copied();
            let outcome = script
                .outcomes
                .get_mut(model)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| {
                    Err(BackendError::Other {
                        message: format!("no scripted outcome for {}", model),
                    })
                });
            (delay, outcome)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}
