use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{InsightError, Result};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LOG_LEVEL: &str = "hrms_insight=info";
pub const MAX_TRANSIENT_RETRIES: u32 = 5;

/// Main configuration structure loaded from hrms_insight.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub heuristics: HeuristicConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Model candidates, sampling and latency bounds for the generation path
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Tried in order; first success wins
    pub candidates: Vec<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// Per-candidate call timeout, 0 disables
    pub call_timeout_ms: u64,
    /// Budget for the whole candidate loop, 0 disables
    pub deadline_ms: u64,
    /// In-place retries of one candidate on transient failures (timeouts, 5xx)
    pub transient_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.0-flash".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
            temperature: 0.3,
            top_p: 0.8,
            max_output_tokens: 2048,
            call_timeout_ms: 30_000,
            deadline_ms: 90_000,
            transient_retries: 0,
            retry_backoff_ms: 200,
        }
    }
}

impl GenerationConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }
}

/// Thresholds and rates used by the heuristic fallbacks.
///
/// These have no documented derivation; keep them reviewable here instead of
/// scattering literals through the rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub overtime_hours_threshold: f64,
    pub overtime_savings_rate: f64,
    pub overtime_affected_share: f64,
    pub attendance_rate_threshold: f64,
    pub attendance_savings_rate: f64,
    pub department_savings_rate: f64,
    pub general_savings_rate: f64,
    pub monthly_working_hours: f64,
    pub overtime_multiplier: f64,
    pub daily_staff_ratio: f64,
    pub shift_hours: f64,
    pub shift_start: String,
    pub shift_end: String,
    pub weekend_days: Vec<u8>,
    pub baseline_coverage_rate: f64,
    pub baseline_optimization_score: f64,
    pub forecast_confidence: f64,
    pub forecast_optimized_cost_ratio: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            overtime_hours_threshold: 100.0,
            overtime_savings_rate: 0.30,
            overtime_affected_share: 0.30,
            attendance_rate_threshold: 90.0,
            attendance_savings_rate: 0.40,
            department_savings_rate: 0.10,
            general_savings_rate: 0.05,
            monthly_working_hours: 176.0,
            overtime_multiplier: 1.5,
            daily_staff_ratio: 0.6,
            shift_hours: 8.0,
            shift_start: "09:00".to_string(),
            shift_end: "17:00".to_string(),
            // Friday and Saturday, Sunday = 0
            weekend_days: vec![5, 6],
            baseline_coverage_rate: 95.0,
            baseline_optimization_score: 0.7,
            forecast_confidence: 0.7,
            forecast_optimized_cost_ratio: 0.95,
        }
    }
}

impl HeuristicConfig {
    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("overtime_savings_rate", self.overtime_savings_rate),
            ("overtime_affected_share", self.overtime_affected_share),
            ("attendance_savings_rate", self.attendance_savings_rate),
            ("department_savings_rate", self.department_savings_rate),
            ("general_savings_rate", self.general_savings_rate),
            ("daily_staff_ratio", self.daily_staff_ratio),
            ("baseline_optimization_score", self.baseline_optimization_score),
            ("forecast_confidence", self.forecast_confidence),
            ("forecast_optimized_cost_ratio", self.forecast_optimized_cost_ratio),
        ];
        for (name, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(config_error(format!(
                    "heuristics.{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }
        if self.overtime_hours_threshold < 0.0 || self.attendance_rate_threshold < 0.0 {
            return Err(config_error("heuristic thresholds must be >= 0"));
        }
        if self.monthly_working_hours <= 0.0 || self.shift_hours <= 0.0 {
            return Err(config_error(
                "heuristics.monthly_working_hours and heuristics.shift_hours must be > 0",
            ));
        }
        if let Some(day) = self.weekend_days.iter().find(|d| **d > 6) {
            return Err(config_error(format!(
                "heuristics.weekend_days entries must be 0..=6, got {}",
                day
            )));
        }
        Ok(())
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("GOOGLE_API_KEY"))
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Self {
            api_key,
            base_url: lookup("HRMS_GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

/// Load `.env` into the process environment: HRMS_ENV_FILE if set, else ./.env.
///
/// Existing variables win. Call before reading any env-derived setting.
pub fn load_env_file() {
    let path = std::env::var("HRMS_ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    load_env_file_from(Path::new(&path));
}

/// Returns whether the file was found and loaded.
pub fn load_env_file_from(path: &Path) -> bool {
    dotenvy::from_path(path).is_ok()
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses HRMS_INSIGHT_CONFIG environment variable or defaults to "hrms_insight.toml"
    pub fn load() -> Result<Self> {
        load_env_file();

        let config_path = std::env::var("HRMS_INSIGHT_CONFIG")
            .unwrap_or_else(|_| "hrms_insight.toml".to_string());

        let mut config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            Self::from_toml_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.runtime = RuntimeConfig::load_from_env();

        if config.runtime.api_key.is_none() {
            tracing::info!("No Gemini API key configured; running in heuristic-only mode");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Env-first overrides for the generation section.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let generation = &mut self.generation;

        if let Some(list) = lookup("HRMS_MODEL_CANDIDATES") {
            let candidates: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if candidates.is_empty() {
                tracing::warn!("HRMS_MODEL_CANDIDATES is empty, keeping configured candidates");
            } else {
                tracing::debug!("HRMS_MODEL_CANDIDATES env override applied");
                generation.candidates = candidates;
            }
        }
        if let Some(v) = lookup("HRMS_GEN_TEMPERATURE").and_then(|v| v.parse().ok()) {
            generation.temperature = v;
        }
        if let Some(v) = lookup("HRMS_GEN_TOP_P").and_then(|v| v.parse().ok()) {
            generation.top_p = v;
        }
        if let Some(v) = lookup("HRMS_GEN_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            generation.max_output_tokens = v;
        }
        if let Some(v) = lookup("HRMS_CALL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            generation.call_timeout_ms = v;
        }
        if let Some(v) = lookup("HRMS_DEADLINE_MS").and_then(|v| v.parse().ok()) {
            generation.deadline_ms = v;
        }
        if let Some(v) = lookup("HRMS_TRANSIENT_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            generation.transient_retries = v.min(MAX_TRANSIENT_RETRIES);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.candidates.is_empty() {
            return Err(config_error("generation.candidates must not be empty"));
        }
        if generation.candidates.iter().any(|c| c.trim().is_empty()) {
            return Err(config_error("generation.candidates must not contain blank names"));
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(config_error("generation.temperature must be between 0.0 and 2.0"));
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(config_error("generation.top_p must be between 0.0 and 1.0"));
        }
        if generation.transient_retries > MAX_TRANSIENT_RETRIES {
            return Err(config_error(format!(
                "generation.transient_retries must be at most {}, got {}",
                MAX_TRANSIENT_RETRIES, generation.transient_retries
            )));
        }
        if generation.max_output_tokens == 0 {
            return Err(config_error("generation.max_output_tokens must be > 0"));
        }
        if generation.deadline_ms > 0
            && generation.call_timeout_ms > 0
            && generation.deadline_ms < generation.call_timeout_ms
        {
            tracing::warn!(
                "generation.deadline_ms ({}) is shorter than one call timeout ({})",
                generation.deadline_ms,
                generation.call_timeout_ms
            );
        }
        self.heuristics.validate()
    }
}

fn config_error(message: impl Into<String>) -> InsightError {
    InsightError::Config {
        message: message.into(),
    }
}
