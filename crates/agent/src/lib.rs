//! Conversation engine for the outbound sales agent
//!
//! The per-turn pipeline: detect intents, route the sales state machine,
//! then produce a reply through three tiers — deterministic quick
//! templates, the response cache, and finally the streaming LLM with TTS
//! overlapped from the first sentence.

pub mod bant;
pub mod cleaner;
pub mod conversation;
pub mod engine;
pub mod intent;
pub mod quality;
pub mod quick;
pub mod response_cache;
pub mod routing;

pub use bant::{BantScores, LeadTier};
pub use cleaner::clean_reply;
pub use conversation::ConversationState;
pub use engine::{EngineReply, ResponseEngine};
pub use intent::{detect_objection, IntentDetector, IntentFlags};
pub use quality::{QualityReport, QualityScorer, QualityStatus};
pub use quick::QuickResponder;
pub use response_cache::{normalize, CacheKey, ResponseCache, ResponseCacheStats};
pub use routing::{route, ReplyDirective, RouteOutcome};
