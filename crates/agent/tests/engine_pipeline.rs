//! Integration tests for the three-tier response engine
//!
//! Exercises the full quick → cache → LLM pipeline against scripted LLM
//! and TTS backends, covering the end-to-end turn scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use salesline_agent::{
    route, ConversationState, IntentDetector, QualityScorer, ReplyDirective, ResponseEngine,
};
use salesline_config::Settings;
use salesline_core::{Call, ChannelTone, LatencyTracker, Lead, ReplySource, SalesState};
use salesline_llm::{Completion, CompletionRequest, LlmError, StreamingLlm};
use salesline_llm::client::FirstSentenceHook;
use salesline_tts::{audio_key, SpeechSynthesizer, SynthesizedAudio, TtsCache, TtsError};

/// Scripted LLM backend
struct FakeLlm {
    text: String,
    /// Simulate a deadline miss that salvaged `text` as the prefix
    timed_out: bool,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeLlm {
    fn replying(text: &str) -> Self {
        Self {
            text: text.to_string(),
            timed_out: false,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn timing_out_with_prefix(prefix: &str) -> Self {
        Self {
            text: prefix.to_string(),
            timed_out: true,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            text: String::new(),
            timed_out: false,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StreamingLlm for FakeLlm {
    async fn complete_streaming(
        &self,
        _request: CompletionRequest,
        on_first_sentence: Option<FirstSentenceHook>,
    ) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LlmError::Timeout);
        }
        if let Some(hook) = on_first_sentence {
            if let Some(sentence) = salesline_llm::first_sentence(&format!("{} ", self.text)) {
                hook(sentence.to_string());
            }
        }
        Ok(Completion {
            text: self.text.clone(),
            time_to_first_token_ms: Some(120),
            total_ms: 900,
            timed_out: self.timed_out,
        })
    }

    async fn warmup(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// TTS backend that encodes the text itself as "audio"
struct FakeTts {
    cache: Arc<TtsCache>,
    fail: bool,
    provider_calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, TtsError> {
        if self.fail {
            return Err(TtsError::Timeout);
        }
        let key = audio_key(text, "alloy", "mp3");
        let filename = TtsCache::filename(&key, "mp3");
        if let Some(bytes) = self.cache.get(&key, "mp3").await {
            return Ok(SynthesizedAudio { filename, bytes, cache_hit: true });
        }
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = Arc::new(text.as_bytes().to_vec());
        self.cache.put(&key, "mp3", bytes.clone()).await.unwrap();
        Ok(SynthesizedAudio { filename, bytes, cache_hit: false })
    }
}

struct Harness {
    engine: ResponseEngine,
    tts_cache: Arc<TtsCache>,
    lead: Lead,
    call: Call,
    _dir: tempfile::TempDir,
}

fn harness_with(llm: FakeLlm, tts_fail: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.tts.voice = "alloy".into();
    settings.tts.format = "mp3".into();

    let tts_cache = Arc::new(TtsCache::new(dir.path(), 50).unwrap());
    let tts = Arc::new(FakeTts {
        cache: tts_cache.clone(),
        fail: tts_fail,
        provider_calls: AtomicUsize::new(0),
    });
    let scorer = Arc::new(QualityScorer::new(75.0, 5.0));
    let engine = ResponseEngine::new(Arc::new(llm), tts, tts_cache.clone(), scorer, &settings);

    let lead = Lead {
        id: uuid::Uuid::new_v4(),
        name: "Maya Chen".into(),
        company: Some("Acme Logistics".into()),
        title: Some("VP Operations".into()),
        industry: Some("logistics".into()),
        phone: "+15550100".into(),
        notes: None,
    };
    let call = Call::new(lead.id, "+15550100", ChannelTone::ColdCall);

    Harness { engine, tts_cache, lead, call, _dir: dir }
}

fn conv_in(state: SalesState, lead: &Lead) -> ConversationState {
    let mut conv = ConversationState::new(ChannelTone::ColdCall, lead);
    conv.state = state;
    conv
}

#[tokio::test]
async fn test_cold_call_opener_is_quick_and_personalized() {
    let h = harness_with(FakeLlm::replying("unused"), false);
    let conv = conv_in(SalesState::Greeting, &h.lead);
    let mut tracker = LatencyTracker::new(h.call.id);

    let reply = h
        .engine
        .respond(&h.call, &h.lead, &conv, ReplyDirective::Generate, "", &mut tracker)
        .await;

    assert_eq!(reply.source, ReplySource::Quick);
    assert!(reply.text.contains("Maya"));
    assert!(reply.quality >= 70.0);
    assert!(reply.audio_filename.is_some());
}

#[tokio::test]
async fn test_llm_tier_caches_and_second_turn_is_cached() {
    let h = harness_with(
        FakeLlm::replying("That makes sense. How do you handle it today?"),
        false,
    );
    let conv = conv_in(SalesState::DiscoveryOpen, &h.lead);
    let user_text = "we mostly use spreadsheets";

    let mut tracker = LatencyTracker::new(h.call.id);
    let first = h
        .engine
        .respond(&h.call, &h.lead, &conv, ReplyDirective::Generate, user_text, &mut tracker)
        .await;
    assert_eq!(first.source, ReplySource::Llm);
    assert!(!first.cache_hit);

    let mut tracker = LatencyTracker::new(h.call.id);
    let second = h
        .engine
        .respond(&h.call, &h.lead, &conv, ReplyDirective::Generate, user_text, &mut tracker)
        .await;
    assert_eq!(second.source, ReplySource::Cached);
    assert!(second.cache_hit);
    assert_eq!(second.text, first.text);
}

#[tokio::test]
async fn test_equivalent_utterances_share_cache_entry() {
    let h = harness_with(FakeLlm::replying("Understood. What changed recently?"), false);
    let conv = conv_in(SalesState::DiscoveryProbe, &h.lead);

    let mut tracker = LatencyTracker::new(h.call.id);
    let _ = h
        .engine
        .respond(
            &h.call,
            &h.lead,
            &conv,
            ReplyDirective::Generate,
            "it broke   LAST month",
            &mut tracker,
        )
        .await;

    let mut tracker = LatencyTracker::new(h.call.id);
    let second = h
        .engine
        .respond(
            &h.call,
            &h.lead,
            &conv,
            ReplyDirective::Generate,
            "It Broke Last Month",
            &mut tracker,
        )
        .await;
    assert_eq!(second.source, ReplySource::Cached);
}

#[tokio::test]
async fn test_overlapped_audio_concatenates_both_sentences() {
    let text = "First part lands here. Second part follows right after.";
    let h = harness_with(FakeLlm::replying(text), false);
    let conv = conv_in(SalesState::ValueProposition, &h.lead);

    let mut tracker = LatencyTracker::new(h.call.id);
    let reply = h
        .engine
        .respond(
            &h.call,
            &h.lead,
            &conv,
            ReplyDirective::Generate,
            "tell me about the product",
            &mut tracker,
        )
        .await;

    assert_eq!(reply.source, ReplySource::Llm);
    let filename = reply.audio_filename.expect("combined audio stored");
    let key = filename.strip_suffix(".mp3").unwrap();
    let bytes = h.tts_cache.get(key, "mp3").await.expect("combined bytes");
    // The fake encodes text as bytes, so the concatenation is literal:
    // first-sentence audio followed by remainder audio.
    assert_eq!(
        String::from_utf8(bytes.to_vec()).unwrap(),
        "First part lands here.Second part follows right after."
    );
}

#[tokio::test]
async fn test_timed_out_prefix_is_served_but_not_cached() {
    let h = harness_with(
        FakeLlm::timing_out_with_prefix("We help teams cut manual work."),
        false,
    );
    let conv = conv_in(SalesState::DeepDive, &h.lead);
    let user_text = "go on";

    let mut tracker = LatencyTracker::new(h.call.id);
    let first = h
        .engine
        .respond(&h.call, &h.lead, &conv, ReplyDirective::Generate, user_text, &mut tracker)
        .await;
    assert_eq!(first.source, ReplySource::Llm);
    assert_eq!(first.text, "We help teams cut manual work.");

    // The prefix was not cached, so the next identical turn hits the LLM.
    let mut tracker = LatencyTracker::new(h.call.id);
    let second = h
        .engine
        .respond(&h.call, &h.lead, &conv, ReplyDirective::Generate, user_text, &mut tracker)
        .await;
    assert_eq!(second.source, ReplySource::Llm);
}

#[tokio::test]
async fn test_llm_failure_falls_back_to_safe_template() {
    let h = harness_with(FakeLlm::failing(), false);
    let conv = conv_in(SalesState::ObjectionHandling, &h.lead);

    let mut tracker = LatencyTracker::new(h.call.id);
    let reply = h
        .engine
        .respond(
            &h.call,
            &h.lead,
            &conv,
            ReplyDirective::Generate,
            "we already use Competitor X",
            &mut tracker,
        )
        .await;

    assert_eq!(reply.source, ReplySource::Quick);
    assert!(!reply.text.is_empty());
    assert!(reply.quality >= 70.0);
}

#[tokio::test]
async fn test_tts_failure_degrades_to_text_only() {
    let h = harness_with(FakeLlm::replying("Fair point. What would change your mind?"), true);
    let conv = conv_in(SalesState::ObjectionHandling, &h.lead);

    let mut tracker = LatencyTracker::new(h.call.id);
    let reply = h
        .engine
        .respond(&h.call, &h.lead, &conv, ReplyDirective::Generate, "not convinced", &mut tracker)
        .await;

    assert!(reply.audio_filename.is_none());
    assert!(!reply.text.is_empty());
}

#[tokio::test]
async fn test_repair_directive_returns_repair_phrase() {
    let h = harness_with(FakeLlm::replying("unused"), false);
    let conv = conv_in(SalesState::DiscoveryOpen, &h.lead);

    let mut tracker = LatencyTracker::new(h.call.id);
    let reply = h
        .engine
        .respond(
            &h.call,
            &h.lead,
            &conv,
            ReplyDirective::Repair,
            "you're breaking up",
            &mut tracker,
        )
        .await;

    assert_eq!(reply.source, ReplySource::Quick);
    assert!(reply.text.to_lowercase().contains("say that once more"));
}

#[tokio::test]
async fn test_full_turn_route_then_respond_scenario_hostile() {
    let h = harness_with(FakeLlm::replying("unused"), false);
    let detector = IntentDetector::new();
    let mut conv = conv_in(SalesState::ValueProposition, &h.lead);

    let user_text = "stop calling me you scammers";
    let flags = detector.detect(user_text);
    let outcome = route(&mut conv, &flags, user_text);
    assert_eq!(outcome.next, SalesState::Wrapup);
    conv.enter(outcome.next);

    let mut tracker = LatencyTracker::new(h.call.id);
    let reply = h
        .engine
        .respond(&h.call, &h.lead, &conv, outcome.directive, user_text, &mut tracker)
        .await;

    assert_eq!(reply.source, ReplySource::Quick);
    assert!(reply.text.split_whitespace().count() <= 20);
    assert!(conv.end_call);
}

#[tokio::test]
async fn test_reply_produced_within_state_budget() {
    let h = harness_with(FakeLlm::replying("Quick answer. Nothing more."), false);
    let conv = conv_in(SalesState::PainConfirm, &h.lead);

    let mut tracker = LatencyTracker::new(h.call.id);
    let reply = tokio::time::timeout(
        conv.state.llm_timeout() + Duration::from_secs(1),
        h.engine.respond(
            &h.call,
            &h.lead,
            &conv,
            ReplyDirective::Generate,
            "yes that is the problem",
            &mut tracker,
        ),
    )
    .await
    .expect("reply within budget");

    assert!(!reply.text.is_empty());
}
