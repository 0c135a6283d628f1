//! Application state
//!
//! The explicitly owned singletons: shared HTTP clients, caches, the
//! response engine, stores, and the broadcast bus. Everything is built
//! once at startup and handed to the router.

use std::sync::Arc;

use salesline_agent::{IntentDetector, QualityScorer, ResponseEngine};
use salesline_config::Settings;
use salesline_core::UpstreamBreakers;
use salesline_llm::{HttpLlmClient, StreamingLlm};
use salesline_persistence::{CallStore, LeadStore, PersistenceLayer, TranscriptStore};
use salesline_tts::{HttpTtsClient, SpeechSynthesizer, TtsCache};

use crate::broadcast::BroadcastBus;
use crate::ServerError;

/// Shared state across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub engine: Arc<ResponseEngine>,
    pub llm: Arc<dyn StreamingLlm>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub tts_cache: Arc<TtsCache>,
    pub calls: Arc<dyn CallStore>,
    pub leads: Arc<dyn LeadStore>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub broadcast: Arc<BroadcastBus>,
    pub scorer: Arc<QualityScorer>,
    pub breakers: Arc<UpstreamBreakers>,
    pub detector: IntentDetector,
}

impl AppState {
    /// Wire up every singleton from settings and a persistence layer
    pub fn build(settings: Settings, persistence: PersistenceLayer) -> Result<Self, ServerError> {
        let breakers = Arc::new(UpstreamBreakers::default());

        let tts_cache = Arc::new(
            TtsCache::new(&settings.tts.cache_dir, settings.tts.memory_cache_size)
                .map_err(|e| ServerError::Internal(e.to_string()))?,
        );
        let tts: Arc<dyn SpeechSynthesizer> = Arc::new(
            HttpTtsClient::new(&settings.tts, tts_cache.clone(), breakers.clone())
                .map_err(|e| ServerError::Internal(e.to_string()))?,
        );
        let llm: Arc<dyn StreamingLlm> = Arc::new(
            HttpLlmClient::new(&settings.llm, breakers.clone())
                .map_err(|e| ServerError::Internal(e.to_string()))?,
        );
        let scorer = Arc::new(QualityScorer::new(
            settings.quality.baseline_score,
            settings.quality.alert_threshold,
        ));
        let engine = Arc::new(ResponseEngine::new(
            llm.clone(),
            tts.clone(),
            tts_cache.clone(),
            scorer.clone(),
            &settings,
        ));

        Ok(Self {
            config: Arc::new(settings),
            engine,
            llm,
            tts,
            tts_cache,
            calls: persistence.calls,
            leads: persistence.leads,
            transcripts: persistence.transcripts,
            broadcast: Arc::new(BroadcastBus::new()),
            scorer,
            breakers,
            detector: IntentDetector::new(),
        })
    }

    /// Public URL of a cached TTS file for a call
    pub fn audio_url(&self, call_id: uuid::Uuid, filename: &str) -> String {
        format!(
            "{}/calls/{}/tts/{}",
            self.config.server.webhook_base_url.trim_end_matches('/'),
            call_id,
            filename
        )
    }

    /// Webhook action URL for the next turn of a call
    pub fn turn_action_url(&self, call_id: uuid::Uuid) -> String {
        format!(
            "{}/webhook/{}/turn",
            self.config.server.webhook_base_url.trim_end_matches('/'),
            call_id
        )
    }
}
