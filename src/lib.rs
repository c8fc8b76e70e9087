//! AI-assisted workforce analytics for HR systems.
//!
//! Calls a generative model through an ordered list of candidates, pulls a
//! typed JSON answer out of the reply, and falls back to deterministic
//! heuristics whenever the model path is unavailable or fails.

pub mod clients;
pub mod config;
pub mod deserializers;
pub mod error;
pub mod extract;
pub mod features;
pub mod invoker;
pub mod orchestrator;
pub mod telemetry;

pub use config::Config;
pub use error::{InsightError, Result};
pub use features::{Feature, Period, PromptPair};
pub use invoker::{Generation, ModelInvoker};
pub use orchestrator::{Analysis, AnalysisSource, Orchestrator};
