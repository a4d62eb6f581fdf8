/// Text-generation capability.
///
/// The pipeline treats generation as an opaque prompt-in/text-out call with
/// a bounded timeout; latency and failure modes of the backing service are
/// recovered by the calling agent, never propagated as fatal.
pub mod ollama;
pub mod script;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation service unreachable: {0}")]
    ServiceUnreachable(String),

    #[error("generation service returned status {0}")]
    BadStatus(u16),

    #[error("generation response malformed: {0}")]
    MalformedResponse(String),

    #[error("generation response was empty")]
    EmptyResponse,
}

/// Prompt-to-text generation. Implementations must be `Send + Sync` for
/// concurrent use behind `Arc`.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
