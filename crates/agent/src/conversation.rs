//! Per-call conversation state
//!
//! Held in memory only for the duration of a turn. Between turns the sales
//! state lives on the call row and everything else is re-derived from the
//! transcript, so concurrent handlers never share mutable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesline_core::{Call, ChannelTone, Lead, SalesState};

use crate::bant::BantScores;
use crate::intent::{detect_objection, IntentDetector, IntentFlags};

/// In-memory state for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub state: SalesState,
    pub state_entered_at: DateTime<Utc>,
    pub bant: BantScores,
    /// Names of intents detected so far, in order
    pub intent_history: Vec<String>,
    pub objection_count: u32,
    /// Saturates at 2; a third audio issue ends the call
    pub tech_issue_count: u32,
    pub end_call: bool,
    pub tone: ChannelTone,
    /// Presentation state to return to after a resolved objection
    pub return_state: Option<SalesState>,
}

impl ConversationState {
    pub fn new(tone: ChannelTone, lead: &Lead) -> Self {
        Self {
            state: SalesState::default(),
            state_entered_at: Utc::now(),
            bant: BantScores::seed_from_lead(lead),
            intent_history: Vec::new(),
            objection_count: 0,
            tech_issue_count: 0,
            end_call: false,
            tone,
            return_state: None,
        }
    }

    /// Rebuild the ephemeral state for a mid-call turn
    ///
    /// The persisted sales state comes off the call row; BANT scores and
    /// the counters are re-derived by re-running detection over the user
    /// lines of the transcript. Detection is deterministic and the scores
    /// are monotone, so the replay converges to what the previous handler
    /// held.
    pub fn resume(call: &Call, lead: &Lead, detector: &IntentDetector) -> Self {
        let mut conv = Self::new(call.channel, lead);
        conv.state = call.sales_state;
        conv.end_call = call.sales_state.is_terminal() || call.status.is_terminal();

        for line in call.full_transcript.lines() {
            let Some(text) = line.strip_prefix("User: ") else {
                continue;
            };
            let flags = detector.detect(text);
            conv.observe_user_text(text, &flags);
            if flags.tech_issue {
                let _ = conv.register_tech_issue();
            }
        }

        conv
    }

    /// Fold one utterance into the derived state: BANT, intent history,
    /// and the objection counter. The tech-issue counter is driven by
    /// routing on live turns and replayed explicitly by [`Self::resume`].
    pub fn observe_user_text(&mut self, text: &str, flags: &IntentFlags) {
        self.bant.update(text);
        for name in flags.active() {
            self.intent_history.push(name.to_string());
        }
        if detect_objection(text) {
            self.objection_count += 1;
        }
    }

    /// Count an audio issue; returns true once the cap is exhausted
    ///
    /// The counter saturates at 2. The issue that would push it past the
    /// cap reports exhaustion instead of incrementing.
    pub fn register_tech_issue(&mut self) -> bool {
        if self.tech_issue_count >= 2 {
            return true;
        }
        self.tech_issue_count += 1;
        false
    }

    /// Move to a new state, tracking entry time
    pub fn enter(&mut self, next: SalesState) {
        if next != self.state {
            self.state_entered_at = Utc::now();
        }
        self.state = next;
        if next.is_terminal() {
            self.end_call = true;
        }
    }
}
