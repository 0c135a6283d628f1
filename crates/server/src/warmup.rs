//! Startup warming
//!
//! Runs as a background task so process readiness is never blocked. One
//! minimal LLM completion warms the endpoint and its TLS session, and the
//! common quick phrases are pre-synthesized into both TTS cache tiers.
//! Safe to re-run; every step is a cache populate or a no-op.

use std::sync::Arc;

use salesline_agent::QuickResponder;
use salesline_core::{ChannelTone, SalesState};
use salesline_tts::SpeechSynthesizer;

use crate::state::AppState;

/// Phrases synthesized at startup, with the neutral address token so the
/// audio is shareable across leads.
fn common_phrases() -> Vec<String> {
    let quick = QuickResponder::new();
    let mut phrases = vec![
        quick.repair(),
        quick.reprompt(""),
        quick.apology_fallback(),
    ];
    for (state, variant) in [
        (SalesState::Greeting, 0),
        (SalesState::Permission, 0),
        (SalesState::Wrapup, 0),
        (SalesState::Wrapup, 1),
    ] {
        if let Some(phrase) = quick.reply(state, ChannelTone::ColdCall, "", variant) {
            phrases.push(phrase);
        }
    }
    phrases
}

/// Startup warmer for HTTP pools, the LLM endpoint, and TTS templates
pub struct WarmupController;

impl WarmupController {
    /// Spawn the warmup task; returns immediately
    pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            Self::run(&state).await;
        })
    }

    async fn run(state: &AppState) {
        let start = std::time::Instant::now();

        // One throwaway completion opens the connection pool and warms
        // the provider end.
        match state.llm.warmup().await {
            Ok(()) => tracing::info!(target: "warmup", "llm endpoint warm"),
            Err(e) => tracing::warn!(target: "warmup", error = %e, "llm warmup failed"),
        }

        let phrases = common_phrases();
        let total = phrases.len();
        let mut warmed = 0usize;
        for phrase in phrases {
            let tts: Arc<dyn SpeechSynthesizer> = state.tts.clone();
            match tts.synthesize(&phrase).await {
                Ok(_) => warmed += 1,
                Err(e) => {
                    tracing::warn!(target: "warmup", error = %e, phrase = %phrase, "phrase warmup failed");
                }
            }
        }

        tracing::info!(
            target: "warmup",
            phrases_warmed = warmed,
            phrases_total = total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "warmup complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_phrases_cover_the_quick_set() {
        let phrases = common_phrases();
        assert!(phrases.len() >= 7);
        // Neutral address token, never a lead name.
        assert!(phrases.iter().all(|p| !p.contains("{name}")));
        assert!(phrases.iter().any(|p| p.contains("there")));
    }
}
