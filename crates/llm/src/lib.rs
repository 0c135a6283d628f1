//! Streaming LLM integration
//!
//! Features:
//! - OpenAI-compatible chat-completions streaming over SSE
//! - First-sentence callback for overlapping TTS with the token stream
//! - Deadline handling that salvages the emitted prefix
//! - State-keyed prompt assembly with a bounded transcript tail

pub mod client;
pub mod prompt;
pub mod sentence;

pub use client::{Completion, CompletionRequest, FirstSentenceHook, HttpLlmClient, StreamingLlm};
pub use prompt::{PromptBuilder, PromptContext};
pub use sentence::{first_sentence, split_sentences};

use salesline_core::ErrorKind;
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout with no output")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Map into the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Api(_) | LlmError::Network(_) => ErrorKind::TransientUpstream,
            LlmError::Timeout => ErrorKind::Timeout,
            LlmError::InvalidResponse(_) => ErrorKind::TransientUpstream,
            LlmError::Configuration(_) => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}
