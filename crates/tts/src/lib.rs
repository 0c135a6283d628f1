//! Speech synthesis with two-tier caching
//!
//! Common phrases dominate an outbound sales call, so synthesis goes
//! memory LRU → content-addressed disk → provider, and both tiers are
//! populated on the way back. Cache keys hash only (text, voice, format) —
//! never the lead — so phrases are shared across calls.

pub mod cache;
pub mod client;

pub use cache::{audio_key, TtsCache};
pub use client::{HttpTtsClient, SpeechSynthesizer, SynthesizedAudio};

use salesline_core::ErrorKind;
use thiserror::Error;

/// TTS errors
#[derive(Error, Debug)]
pub enum TtsError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Synthesis timed out")]
    Timeout,

    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TtsError {
    /// Map into the shared taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            TtsError::Api(_) | TtsError::Network(_) => ErrorKind::TransientUpstream,
            TtsError::Timeout => ErrorKind::Timeout,
            TtsError::CacheIo(_) | TtsError::Configuration(_) => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Network(err.to_string())
        }
    }
}
