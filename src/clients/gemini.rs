//! Gemini `generateContent` backend over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::traits::{BackendError, GenerationRequest, GenerativeBackend};
use crate::config::RuntimeConfig;
use crate::error::Result;

const BACKEND_NAME: &str = "gemini";
const ERROR_BODY_CAP: usize = 500;

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: SamplingBody,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<PartBody<'a>>,
}

#[derive(Serialize)]
struct PartBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SamplingBody {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

impl GeminiBackend {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into(),
        })
    }

    pub fn from_runtime(runtime: &RuntimeConfig, timeout: Option<Duration>) -> Result<Self> {
        Self::new(runtime.api_key.clone(), runtime.base_url.clone(), timeout)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> std::result::Result<String, BackendError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(BackendError::MissingCredential {
                backend: BACKEND_NAME.to_string(),
            });
        };

        let body = GenerateContentBody {
            system_instruction: request.system_instruction.as_deref().map(|text| Content {
                role: None,
                parts: vec![PartBody { text }],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![PartBody {
                    text: &request.prompt,
                }],
            }],
            generation_config: SamplingBody {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_output_tokens,
            },
        };

        debug!(model, chars = request.prompt.len(), "sending generateContent request");

        let resp = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(status_error(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = resp.json().await.map_err(|e| BackendError::Other {
            message: format!("invalid generateContent payload: {}", e),
        })?;

        if parsed.candidates.is_empty() {
            if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(BackendError::Other {
                    message: format!("prompt blocked by {}: {}", model, reason),
                });
            }
            return Ok(String::new());
        }

        let candidate = &parsed.candidates[0];
        let text: String = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            debug!(
                model,
                finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
                "candidate carried no text"
            );
        }
        Ok(text)
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    BackendError::Transport {
        message: err.to_string(),
        timed_out: err.is_timeout(),
    }
}

fn status_error(code: u16, body: &str) -> BackendError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => BackendError::Status {
            code,
            status: envelope.error.status,
            message: envelope
                .error
                .message
                .unwrap_or_else(|| cap(body, ERROR_BODY_CAP)),
        },
        Err(_) => BackendError::Status {
            code,
            status: None,
            message: cap(body, ERROR_BODY_CAP),
        },
    }
}

fn cap(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
