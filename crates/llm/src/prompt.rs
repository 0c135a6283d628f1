//! Prompt assembly
//!
//! One state-specific template per sales state, a bounded tail of the
//! transcript for continuity, and the lead fields for personalization.
//! Nothing else about the prospect ever enters the prompt.

use salesline_core::{ChannelTone, Lead, SalesState};

/// Conversation facts that shape the prompt beyond the raw transcript
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub tone: ChannelTone,
    /// Qualification tier label, e.g. "warm_lead"
    pub tier: &'static str,
    pub objection_count: u32,
}

/// State-keyed prompt builder
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    /// Hard cap on the transcript tail, in characters
    pub tail_chars: usize,
    /// Hard cap on the whole prompt, in characters
    pub max_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            tail_chars: 800,
            max_chars: 2400,
        }
    }
}

impl PromptBuilder {
    /// Assemble the prompt for one turn
    pub fn build(
        &self,
        state: SalesState,
        lead: &Lead,
        ctx: &PromptContext,
        transcript: &str,
        user_text: &str,
    ) -> String {
        let tail = tail_chars(transcript, self.tail_chars);

        let mut prompt = String::with_capacity(self.max_chars.min(2048));
        prompt.push_str(
            "You are a friendly sales agent on a live phone call. Replies are spoken \
             aloud: at most two short sentences, at most one question, no lists, no \
             markdown, never mention being an AI.\n",
        );

        prompt.push_str("Prospect: ");
        prompt.push_str(&lead.name);
        if let Some(title) = &lead.title {
            prompt.push_str(", ");
            prompt.push_str(title);
        }
        if let Some(company) = &lead.company {
            prompt.push_str(" at ");
            prompt.push_str(company);
        }
        if let Some(industry) = &lead.industry {
            prompt.push_str(" (");
            prompt.push_str(industry);
            prompt.push(')');
        }
        prompt.push('\n');
        if let Some(notes) = &lead.notes {
            prompt.push_str("Context: ");
            prompt.push_str(notes);
            prompt.push('\n');
        }

        prompt.push_str("Call type: ");
        prompt.push_str(tone_hint(ctx.tone));
        prompt.push('\n');
        prompt.push_str("Qualification: ");
        prompt.push_str(ctx.tier);
        if ctx.objection_count > 0 {
            prompt.push_str(&format!(", {} objection(s) so far", ctx.objection_count));
        }
        prompt.push('\n');

        prompt.push_str("Goal right now: ");
        prompt.push_str(state_instruction(state));
        prompt.push('\n');

        if !tail.is_empty() {
            prompt.push_str("Recent conversation:\n");
            prompt.push_str(tail);
            prompt.push('\n');
        }

        prompt.push_str("The prospect just said: \"");
        prompt.push_str(user_text.trim());
        prompt.push_str("\"\nYour reply:");

        clamp_chars(prompt, self.max_chars)
    }
}

/// Last `max` characters of the transcript, cut on a char boundary
fn tail_chars(transcript: &str, max: usize) -> &str {
    let count = transcript.chars().count();
    if count <= max {
        return transcript;
    }
    let skip = count - max;
    match transcript.char_indices().nth(skip) {
        Some((idx, _)) => &transcript[idx..],
        None => transcript,
    }
}

/// Truncate to `max` characters on a char boundary
fn clamp_chars(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        return s;
    }
    s.chars().take(max).collect()
}

fn tone_hint(tone: ChannelTone) -> &'static str {
    match tone {
        ChannelTone::ColdCall => "cold outreach; earn attention quickly, stay humble",
        ChannelTone::WarmReferral => "warm referral; reference the shared connection naturally",
        ChannelTone::Inbound => "they reached out first; be direct and helpful",
    }
}

fn state_instruction(state: SalesState) -> &'static str {
    match state {
        SalesState::Greeting => {
            "greet them by first name and confirm they can hear you clearly"
        }
        SalesState::Permission => {
            "ask for thirty seconds of their time; accept a no gracefully"
        }
        SalesState::DiscoveryOpen => {
            "ask one open question about how they handle this area today"
        }
        SalesState::DiscoveryProbe => {
            "probe gently on the last answer; if they are guarded, offer a concrete example to react to"
        }
        SalesState::PainConfirm => {
            "reflect the pain point back in their own words and confirm you understood it"
        }
        SalesState::ValueBridge => {
            "bridge from their pain to what you offer in one natural sentence"
        }
        SalesState::ValueProposition => {
            "state the core value proposition tied to their specific situation"
        }
        SalesState::DeepDive => {
            "go deeper with one proof point or customer result relevant to their industry"
        }
        SalesState::ObjectionHandling => {
            "acknowledge the objection sincerely, answer it briefly, never disparage a competitor"
        }
        SalesState::Authority => {
            "ask who else would be involved in a decision like this"
        }
        SalesState::FollowUp => {
            "ask if you can send a short follow-up email with details"
        }
        SalesState::Scheduling => {
            "propose a concrete meeting slot and ask for their email or preferred time"
        }
        SalesState::Wrapup => {
            "thank them warmly and end the call politely"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: "Maya Chen".into(),
            company: Some("Acme Logistics".into()),
            title: Some("VP Operations".into()),
            industry: Some("logistics".into()),
            phone: "+15550100".into(),
            notes: None,
        }
    }

    fn ctx() -> PromptContext {
        PromptContext {
            tone: ChannelTone::ColdCall,
            tier: "warm_lead",
            objection_count: 0,
        }
    }

    #[test]
    fn test_prompt_contains_state_and_lead() {
        let builder = PromptBuilder::default();
        let prompt = builder.build(
            SalesState::DiscoveryOpen,
            &lead(),
            &ctx(),
            "User: hi\nAgent: hello Maya",
            "we mostly do it by hand",
        );
        assert!(prompt.contains("Maya Chen"));
        assert!(prompt.contains("Acme Logistics"));
        assert!(prompt.contains("open question"));
        assert!(prompt.contains("we mostly do it by hand"));
    }

    #[test]
    fn test_tail_cap_is_hard() {
        let builder = PromptBuilder { tail_chars: 50, max_chars: 2400 };
        let long_transcript = "x".repeat(5000);
        let prompt = builder.build(
            SalesState::DeepDive,
            &lead(),
            &ctx(),
            &long_transcript,
            "ok",
        );
        // The tail section carries at most 50 of the transcript chars.
        let xs = prompt.chars().filter(|&c| c == 'x').count();
        assert_eq!(xs, 50);
    }

    #[test]
    fn test_total_budget_is_hard() {
        let builder = PromptBuilder { tail_chars: 800, max_chars: 500 };
        let prompt = builder.build(
            SalesState::DeepDive,
            &lead(),
            &ctx(),
            &"word ".repeat(400),
            "ok",
        );
        assert!(prompt.chars().count() <= 500);
    }

    #[test]
    fn test_tail_cut_on_char_boundary() {
        let transcript = format!("{}नमस्ते", "a".repeat(10));
        // Should not panic on multi-byte boundary.
        let tail = tail_chars(&transcript, 3);
        assert_eq!(tail.chars().count(), 3);
    }

    #[test]
    fn test_every_state_has_instruction() {
        for state in SalesState::ALL {
            assert!(!state_instruction(state).is_empty());
        }
    }

    #[test]
    fn test_tone_changes_wording() {
        let builder = PromptBuilder::default();
        let cold = builder.build(SalesState::Greeting, &lead(), &ctx(), "", "");
        let warm_ctx = PromptContext { tone: ChannelTone::WarmReferral, ..ctx() };
        let warm = builder.build(SalesState::Greeting, &lead(), &warm_ctx, "", "");
        assert_ne!(cold, warm);
    }
}
