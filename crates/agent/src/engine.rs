//! Three-tier response engine
//!
//! quick template → response cache → streaming LLM. On the LLM path the
//! first complete sentence spawns a TTS task that runs while the rest of
//! the completion streams in; the audio chunks are concatenated in order
//! afterwards. Failures degrade tier by tier and bottom out at a safe
//! spoken template — the prospect never hears an error.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use salesline_core::{Call, LatencyTracker, Lead, ReplySource, TurnStage};
use salesline_llm::{CompletionRequest, PromptBuilder, PromptContext, StreamingLlm};
use salesline_tts::{audio_key, SpeechSynthesizer, SynthesizedAudio, TtsCache, TtsError};

use crate::cleaner::clean_reply;
use crate::conversation::ConversationState;
use crate::quality::QualityScorer;
use crate::quick::QuickResponder;
use crate::response_cache::{CacheKey, ResponseCache, ResponseCacheStats};
use crate::routing::ReplyDirective;

/// Engine output for one turn
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub text: String,
    pub source: ReplySource,
    /// Content-addressed audio filename, or None when synthesis failed and
    /// the carrier should speak the text natively
    pub audio_filename: Option<String>,
    pub cache_hit: bool,
    pub quality: f32,
}

/// The per-turn reply pipeline
pub struct ResponseEngine {
    llm: Arc<dyn StreamingLlm>,
    tts: Arc<dyn SpeechSynthesizer>,
    tts_cache: Arc<TtsCache>,
    voice: String,
    format: String,
    prompt_builder: PromptBuilder,
    cache: ResponseCache,
    quick: QuickResponder,
    scorer: Arc<QualityScorer>,
    max_tokens: usize,
    serial_pipeline: bool,
}

impl ResponseEngine {
    pub fn new(
        llm: Arc<dyn StreamingLlm>,
        tts: Arc<dyn SpeechSynthesizer>,
        tts_cache: Arc<TtsCache>,
        scorer: Arc<QualityScorer>,
        settings: &salesline_config::Settings,
    ) -> Self {
        Self {
            llm,
            tts,
            tts_cache,
            voice: settings.tts.voice.clone(),
            format: settings.tts.format.clone(),
            prompt_builder: PromptBuilder::default(),
            cache: ResponseCache::new(
                Duration::from_secs(settings.engine.response_cache_ttl_seconds),
                settings.engine.response_cache_max_entries,
            ),
            quick: QuickResponder::new(),
            scorer,
            max_tokens: settings.llm.max_tokens,
            serial_pipeline: settings.engine.serial_pipeline,
        }
    }

    /// Response cache statistics for the operator endpoint
    pub fn cache_stats(&self) -> ResponseCacheStats {
        self.cache.stats()
    }

    /// Produce the reply for one routed turn
    pub async fn respond(
        &self,
        call: &Call,
        lead: &Lead,
        conv: &ConversationState,
        directive: ReplyDirective,
        user_text: &str,
        tracker: &mut LatencyTracker,
    ) -> EngineReply {
        let reply = match directive {
            ReplyDirective::Identify => {
                self.template_reply(self.quick.identification(lead.first_name()), tracker)
                    .await
            }
            ReplyDirective::Repair => self.template_reply(self.quick.repair(), tracker).await,
            ReplyDirective::Reprompt => {
                self.template_reply(self.quick.reprompt(lead.first_name()), tracker)
                    .await
            }
            ReplyDirective::Generate => {
                if conv.state.is_quick() {
                    self.quick_tier(conv, lead, tracker).await
                } else {
                    self.generate_tiers(call, lead, conv, user_text, tracker).await
                }
            }
        };

        // Quality scoring happens off the critical path; the turn record
        // keeps the already computed score.
        let scorer = self.scorer.clone();
        let report = scorer.score(&reply.text, reply.source, user_text);
        let quality = report.overall;
        let source = reply.source;
        tokio::spawn(async move {
            scorer.record(source, &report);
        });

        EngineReply { quality, ..reply }
    }

    /// Tier 1: deterministic template for the opening and closing states
    async fn quick_tier(
        &self,
        conv: &ConversationState,
        lead: &Lead,
        tracker: &mut LatencyTracker,
    ) -> EngineReply {
        let variant = conv.intent_history.len();
        let text = self
            .quick
            .reply(conv.state, conv.tone, lead.first_name(), variant)
            .unwrap_or_else(|| self.quick.apology_fallback());
        self.template_reply(text, tracker).await
    }

    async fn template_reply(&self, text: String, tracker: &mut LatencyTracker) -> EngineReply {
        let audio_filename = self.synthesize_or_degrade(&text).await;
        tracker.mark(TurnStage::TtsDone);
        EngineReply {
            text,
            source: ReplySource::Quick,
            audio_filename,
            cache_hit: false,
            quality: 0.0,
        }
    }

    /// Tiers 2 and 3: cache lookup, then the streaming LLM
    async fn generate_tiers(
        &self,
        call: &Call,
        lead: &Lead,
        conv: &ConversationState,
        user_text: &str,
        tracker: &mut LatencyTracker,
    ) -> EngineReply {
        let key = CacheKey::new(conv.state, lead.id, user_text);

        if let Some(text) = self.cache.get(&key) {
            let audio_filename = self.synthesize_or_degrade(&text).await;
            tracker.mark(TurnStage::TtsDone);
            return EngineReply {
                text,
                source: ReplySource::Cached,
                audio_filename,
                cache_hit: true,
                quality: 0.0,
            };
        }

        self.llm_tier(call, lead, conv, user_text, key, tracker).await
    }

    /// Tier 3: stream the completion, overlapping TTS from the first
    /// sentence
    async fn llm_tier(
        &self,
        call: &Call,
        lead: &Lead,
        conv: &ConversationState,
        user_text: &str,
        key: CacheKey,
        tracker: &mut LatencyTracker,
    ) -> EngineReply {
        let prompt_ctx = PromptContext {
            tone: conv.tone,
            tier: conv.bant.tier().as_str(),
            objection_count: conv.objection_count,
        };
        let prompt = self.prompt_builder.build(
            conv.state,
            lead,
            &prompt_ctx,
            &call.full_transcript,
            user_text,
        );
        tracker.mark(TurnStage::PromptBuilt);
        let prompt_ms = tracker.stage_ms(TurnStage::PromptBuilt).unwrap_or(0);

        let request = CompletionRequest {
            prompt,
            max_tokens: self.max_tokens,
            timeout: conv.state.llm_timeout(),
        };

        // The first-sentence hook spawns the overlapped TTS task; the slot
        // hands the cleaned sentence and its join handle back to this turn.
        type OverlapSlot = Arc<Mutex<Option<(String, JoinHandle<Result<SynthesizedAudio, TtsError>>)>>>;
        let overlap: OverlapSlot = Arc::new(Mutex::new(None));

        let hook = if self.serial_pipeline {
            None
        } else {
            let overlap = overlap.clone();
            let tts = self.tts.clone();
            Some(Box::new(move |sentence: String| {
                let cleaned = clean_reply(&sentence);
                if cleaned.is_empty() {
                    return;
                }
                let task_text = cleaned.clone();
                let handle = tokio::spawn(async move { tts.synthesize(&task_text).await });
                *overlap.lock() = Some((cleaned, handle));
            }) as Box<dyn FnOnce(String) + Send>)
        };

        let completion = match self.llm.complete_streaming(request, hook).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "llm", call_id = %call.id, error = %e, "falling back to safe template");
                // Parent failed: cancel the overlapped child, if any.
                if let Some((_, handle)) = overlap.lock().take() {
                    handle.abort();
                }
                return self.template_reply(self.quick.apology_fallback(), tracker).await;
            }
        };

        if let Some(ttft) = completion.time_to_first_token_ms {
            tracker.set_stage_ms(TurnStage::LlmFirstToken, prompt_ms + ttft);
        }
        tracker.mark(TurnStage::LlmDone);

        let cleaned = clean_reply(&completion.text);
        if cleaned.is_empty() {
            if let Some((_, handle)) = overlap.lock().take() {
                handle.abort();
            }
            return self.template_reply(self.quick.apology_fallback(), tracker).await;
        }

        let overlapped = overlap.lock().take();
        let audio_filename = self.finish_audio(&cleaned, overlapped).await;
        tracker.mark(TurnStage::TtsDone);

        // Salvaged prefixes are served but not cached; a repeat of the
        // utterance deserves a full completion.
        if !completion.timed_out {
            self.cache.set(key, cleaned.clone());
        }

        EngineReply {
            text: cleaned,
            source: ReplySource::Llm,
            audio_filename,
            cache_hit: false,
            quality: 0.0,
        }
    }

    /// Await the overlapped first-sentence audio and synthesize the
    /// remainder, concatenating the encoded chunks in order.
    async fn finish_audio(
        &self,
        cleaned: &str,
        overlap: Option<(String, JoinHandle<Result<SynthesizedAudio, TtsError>>)>,
    ) -> Option<String> {
        let Some((first_sentence, handle)) = overlap else {
            return self.synthesize_or_degrade(cleaned).await;
        };

        let first_audio = match handle.await {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                tracing::warn!(target: "tts", error = %e, "first-sentence synthesis failed");
                return self.synthesize_or_degrade(cleaned).await;
            }
            Err(e) => {
                tracing::warn!(target: "tts", error = %e, "first-sentence task failed");
                return self.synthesize_or_degrade(cleaned).await;
            }
        };

        // Cleaning the full text may have rewritten the opening; if so the
        // overlapped audio no longer matches and the whole reply is
        // synthesized fresh.
        let Some(remainder) = cleaned.strip_prefix(first_sentence.as_str()) else {
            return self.synthesize_or_degrade(cleaned).await;
        };
        let remainder = remainder.trim();

        if remainder.is_empty() {
            return Some(first_audio.filename);
        }

        let rest_audio = match self.tts.synthesize(remainder).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(target: "tts", error = %e, "remainder synthesis failed");
                return None;
            }
        };

        let mut combined = Vec::with_capacity(first_audio.bytes.len() + rest_audio.bytes.len());
        combined.extend_from_slice(&first_audio.bytes);
        combined.extend_from_slice(&rest_audio.bytes);

        let key = audio_key(cleaned, &self.voice, &self.format);
        let filename = TtsCache::filename(&key, &self.format);
        if let Err(e) = self
            .tts_cache
            .put(&key, &self.format, Arc::new(combined))
            .await
        {
            tracing::warn!(target: "tts", error = %e, "failed to store combined audio");
            return None;
        }
        Some(filename)
    }

    async fn synthesize_or_degrade(&self, text: &str) -> Option<String> {
        match self.tts.synthesize(text).await {
            Ok(audio) => Some(audio.filename),
            Err(e) => {
                tracing::warn!(target: "tts", error = %e, "synthesis failed, degrading to carrier speech");
                None
            }
        }
    }
}
