//! Deterministic quick responses
//!
//! A static table from (state, channel tone) to a handful of templates
//! with first-name slot-filling. Covers the opening and closing states
//! plus the special one-turn replies (identification, audio repair,
//! re-prompt, and the apology fallback when the LLM produces nothing).
//!
//! Template contract: at most one question, 5-15 words, and every
//! template scores at least 70 with the quality scorer.

use salesline_core::{ChannelTone, SalesState};

/// Static reply templates with `{name}` slot-filling
#[derive(Debug, Default, Clone, Copy)]
pub struct QuickResponder;

impl QuickResponder {
    pub fn new() -> Self {
        Self
    }

    /// Template reply for a quick state, varied by turn index
    pub fn reply(
        &self,
        state: SalesState,
        tone: ChannelTone,
        first_name: &str,
        variant: usize,
    ) -> Option<String> {
        let templates = templates_for(state, tone)?;
        let template = templates[variant % templates.len()];
        Some(fill(template, first_name))
    }

    /// One-turn identification reply; does not advance the state
    pub fn identification(&self, first_name: &str) -> String {
        fill(
            "Of course {name}, this is Alex from Salesline, calling about your operations workflow.",
            first_name,
        )
    }

    /// Repair phrase for an audio issue
    pub fn repair(&self) -> String {
        "Sorry, the line dipped for a second. Could you say that once more?".to_string()
    }

    /// Gentle re-prompt after silence
    pub fn reprompt(&self, first_name: &str) -> String {
        fill("Sorry {name}, I didn't catch that. Could you repeat it?", first_name)
    }

    /// Safe fallback when generation fails entirely
    pub fn apology_fallback(&self) -> String {
        "Sorry, I lost my train of thought. Could you tell me a bit more about that?".to_string()
    }
}

fn fill(template: &str, first_name: &str) -> String {
    let name = if first_name.trim().is_empty() {
        "there"
    } else {
        first_name
    };
    template.replace("{name}", name)
}

fn templates_for(state: SalesState, tone: ChannelTone) -> Option<&'static [&'static str]> {
    match (state, tone) {
        (SalesState::Greeting, ChannelTone::ColdCall) => Some(&[
            "Hi {name}, this is Alex from Salesline. Can you hear me alright?",
            "Hello {name}, Alex here from Salesline. Is the line clear on your end?",
        ]),
        (SalesState::Greeting, ChannelTone::WarmReferral) => Some(&[
            "Hi {name}, Alex from Salesline. Our mutual contact suggested I reach out. Can you hear me okay?",
            "Hello {name}, this is Alex from Salesline, following a referral. Is the line clear?",
        ]),
        (SalesState::Greeting, ChannelTone::Inbound) => Some(&[
            "Hi {name}, Alex from Salesline returning your inquiry. Can you hear me alright?",
        ]),
        (SalesState::Permission, ChannelTone::ColdCall) => Some(&[
            "I know this is out of the blue, {name}. Could I take thirty seconds?",
            "Thanks {name}. Would thirty seconds be alright to explain why I called?",
        ]),
        (SalesState::Permission, ChannelTone::WarmReferral) => Some(&[
            "Since we have a contact in common, {name}, may I take thirty seconds?",
        ]),
        (SalesState::Permission, ChannelTone::Inbound) => Some(&[
            "Happy to pick up where your note left off, {name}. Shall I?",
        ]),
        (SalesState::Wrapup, _) => Some(&[
            "Understood {name}, thanks for your time. Have a great day.",
            "No problem {name}, I appreciate the moment. Take care.",
            "Thanks for the chat {name}. All the best.",
        ]),
        _ => None,
    }
}
