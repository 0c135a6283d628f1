//! BANT qualification scoring
//!
//! Keyword and regex patterns over each utterance set the four sub-scores.
//! Scores are monotone non-decreasing within a call: once budget language
//! is heard, it stays heard.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use salesline_core::Lead;

use crate::intent::match_text;
use crate::response_cache::normalize;

/// Qualification tier derived from the mean sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTier {
    HotLead,
    WarmLead,
    Lukewarm,
    ColdLead,
}

impl LeadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadTier::HotLead => "hot_lead",
            LeadTier::WarmLead => "warm_lead",
            LeadTier::Lukewarm => "lukewarm",
            LeadTier::ColdLead => "cold_lead",
        }
    }

    fn from_mean(mean: f32) -> Self {
        if mean >= 75.0 {
            LeadTier::HotLead
        } else if mean >= 50.0 {
            LeadTier::WarmLead
        } else if mean >= 30.0 {
            LeadTier::Lukewarm
        } else {
            LeadTier::ColdLead
        }
    }
}

static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£]\s?\d|(\d[\d,]*\s?(dollars|bucks|grand|k\b))").expect("currency pattern"));

static BUDGET_WORDS: &[&str] = &[
    "budget",
    "pricing",
    "how much",
    "what does it cost",
    "per month",
    "per seat",
    "per user",
    "spend",
];

static AUTHORITY_WORDS: &[&str] = &[
    " vp ",
    "vice president",
    "chief",
    " cto ",
    " ceo ",
    " cfo ",
    " coo ",
    "founder",
    " head of ",
    "i decide",
    "my decision",
    "my call",
    "i approve",
    "i sign off",
];

static NEED_WORDS: &[&str] = &[
    "struggle",
    "struggling",
    "problem",
    "pain",
    "painful",
    "manual",
    "by hand",
    "wasting",
    "waste of",
    "frustrat",
    "bottleneck",
    "slow us down",
    "slowing us down",
    "error prone",
];

static TIMELINE_WORDS: &[&str] = &[
    "this quarter",
    "next quarter",
    "this month",
    "next month",
    "this year",
    "asap",
    "as soon as",
    "right away",
    "deadline",
    "by the end of",
    "next week",
];

/// Running BANT sub-scores, each in [0, 100]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BantScores {
    pub budget: u8,
    pub authority: u8,
    pub need: u8,
    pub timeline: u8,
}

impl BantScores {
    /// Seed authority from the lead's title before the first turn
    pub fn seed_from_lead(lead: &Lead) -> Self {
        let mut scores = Self::default();
        if let Some(title) = &lead.title {
            let padded = match_text(title);
            if AUTHORITY_WORDS.iter().any(|w| padded.contains(w)) {
                scores.authority = 85;
            }
        }
        scores
    }

    /// Update from one utterance; every sub-score only moves up
    pub fn update(&mut self, text: &str) {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return;
        }
        let padded = match_text(text);

        if CURRENCY.is_match(&normalized) || BUDGET_WORDS.iter().any(|w| padded.contains(w)) {
            self.budget = self.budget.max(80);
        }
        if AUTHORITY_WORDS.iter().any(|w| padded.contains(w)) {
            self.authority = self.authority.max(85);
        }
        if NEED_WORDS.iter().any(|w| padded.contains(w)) {
            self.need = self.need.max(88);
        }
        if TIMELINE_WORDS.iter().any(|w| padded.contains(w)) {
            self.timeline = self.timeline.max(85);
        }
    }

    pub fn mean(&self) -> f32 {
        f32::from(self.budget) / 4.0
            + f32::from(self.authority) / 4.0
            + f32::from(self.need) / 4.0
            + f32::from(self.timeline) / 4.0
    }

    pub fn tier(&self) -> LeadTier {
        LeadTier::from_mean(self.mean())
    }
}
