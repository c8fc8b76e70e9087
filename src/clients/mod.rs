pub mod gemini;
pub mod scripted;
pub mod traits;

pub use gemini::GeminiBackend;
// Test double, see the module docs.
pub use scripted::ScriptedBackend;
pub use traits::{
    BackendError, DisabledBackend, FailureKind, GenerationRequest, GenerativeBackend,
};
