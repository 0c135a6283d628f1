//! Call, lead, and turn records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::SalesState;

/// Call lifecycle status, mirroring the carrier's callback vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Failed,
    Canceled,
    NoAnswer,
    Busy,
}

impl CallStatus {
    /// Parse the carrier's hyphenated status strings
    pub fn from_carrier(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(CallStatus::Queued),
            "initiated" => Some(CallStatus::Initiated),
            "ringing" => Some(CallStatus::Ringing),
            "in-progress" | "in_progress" => Some(CallStatus::InProgress),
            "completed" => Some(CallStatus::Completed),
            "failed" => Some(CallStatus::Failed),
            "canceled" | "cancelled" => Some(CallStatus::Canceled),
            "no-answer" | "no_answer" => Some(CallStatus::NoAnswer),
            "busy" => Some(CallStatus::Busy),
            _ => None,
        }
    }

    /// Terminal statuses end the call lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::Failed
                | CallStatus::Canceled
                | CallStatus::NoAnswer
                | CallStatus::Busy
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Queued => "queued",
            CallStatus::Initiated => "initiated",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in_progress",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
            CallStatus::Canceled => "canceled",
            CallStatus::NoAnswer => "no_answer",
            CallStatus::Busy => "busy",
        }
    }
}

/// How the call was sourced; drives the wording of quick templates and prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTone {
    #[default]
    ColdCall,
    WarmReferral,
    Inbound,
}

impl ChannelTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelTone::ColdCall => "cold_call",
            ChannelTone::WarmReferral => "warm_referral",
            ChannelTone::Inbound => "inbound",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cold_call" => Some(ChannelTone::ColdCall),
            "warm_referral" => Some(ChannelTone::WarmReferral),
            "inbound" => Some(ChannelTone::Inbound),
            _ => None,
        }
    }
}

/// A single telephony session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub lead_id: Uuid,
    /// Carrier-assigned session identifier
    pub carrier_sid: Option<String>,
    pub phone: String,
    pub status: CallStatus,
    /// Current sales state, persisted so a turn can resume mid-conversation
    pub sales_state: SalesState,
    pub channel: ChannelTone,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Append-only transcript blob; the source of truth for the conversation
    pub full_transcript: String,
    /// Written by the post-call analyzer
    pub transcript_summary: Option<String>,
    pub sentiment: Option<String>,
    pub interest_level: Option<String>,
    pub recording_url: Option<String>,
}

impl Call {
    /// Create a freshly queued call for a lead
    pub fn new(lead_id: Uuid, phone: impl Into<String>, channel: ChannelTone) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            carrier_sid: None,
            phone: phone.into(),
            status: CallStatus::Queued,
            sales_state: SalesState::default(),
            channel,
            started_at: None,
            ended_at: None,
            full_transcript: String::new(),
            transcript_summary: None,
            sentiment: None,
            interest_level: None,
            recording_url: None,
        }
    }

    /// Call duration in seconds, when both endpoints are known
    pub fn duration_secs(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }

    /// Append one line to the transcript blob
    pub fn append_transcript(&mut self, speaker: &str, text: &str) {
        if !self.full_transcript.is_empty() {
            self.full_transcript.push('\n');
        }
        self.full_transcript.push_str(speaker);
        self.full_transcript.push_str(": ");
        self.full_transcript.push_str(text);
    }
}

/// The prospect being called; read-mostly during a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub company: Option<String>,
    pub title: Option<String>,
    pub industry: Option<String>,
    pub phone: String,
    /// Free-form context merged into prompts
    pub notes: Option<String>,
}

impl Lead {
    /// First name for slot-filling, with a neutral fallback
    pub fn first_name(&self) -> &str {
        let first = self.name.split_whitespace().next().unwrap_or("");
        if first.is_empty() {
            "there"
        } else {
            first
        }
    }
}

/// Which tier of the response pipeline produced a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Quick,
    Cached,
    Llm,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::Quick => "quick",
            ReplySource::Cached => "cached",
            ReplySource::Llm => "llm",
        }
    }
}

/// One user-utterance / agent-reply cycle; emitted to logs and broadcast,
/// never persisted as a row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub call_id: Uuid,
    pub user_text: String,
    pub reply_text: String,
    pub source: ReplySource,
    pub prompt_ms: u64,
    pub llm_ms: u64,
    pub tts_ms: u64,
    pub total_ms: u64,
    pub quality_score: Option<f32>,
    pub cache_hit: bool,
    pub timestamp: DateTime<Utc>,
}
