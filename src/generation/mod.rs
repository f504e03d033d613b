//! External answer generation.
//!
//! Generation is optional and never fatal. The orchestrator wraps every call
//! in a timeout and falls back to the retrieved passage on any error.
pub mod openai;
pub mod prompts;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::OpenAiGenerator;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("no generator configured")]
    NotConfigured,

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("generation request failed: {0}")]
    Http(String),

    #[error("unexpected generation response: {0}")]
    BadResponse(String),
}

/// A chat-style text generator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}
