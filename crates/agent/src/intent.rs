//! Intent detection
//!
//! A single scan of the lowercased, whitespace-normalized utterance sets a
//! flags record over thirteen intents. Patterns are fixed phrase lists
//! compiled into the detector at startup; word-bounded phrases are matched
//! against the space-padded utterance so "no" never fires inside "know".

use serde::Serialize;

use crate::response_cache::normalize;

/// Flags record produced by one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntentFlags {
    pub no_time: bool,
    pub just_tell: bool,
    pub hostile: bool,
    pub not_interested: bool,
    pub tech_issue: bool,
    pub who_is_this: bool,
    pub permission_yes: bool,
    pub permission_no: bool,
    pub guarded: bool,
    pub confirm_yes: bool,
    pub resonance: bool,
    pub hesitation: bool,
    pub schedule: bool,
}

impl IntentFlags {
    /// Intents that force an exit regardless of state
    pub fn hard_exit(&self) -> bool {
        self.hostile || self.not_interested
    }

    /// Names of the set flags, for the conversation intent history
    pub fn active(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let pairs: [(&'static str, bool); 13] = [
            ("no_time", self.no_time),
            ("just_tell", self.just_tell),
            ("hostile", self.hostile),
            ("not_interested", self.not_interested),
            ("tech_issue", self.tech_issue),
            ("who_is_this", self.who_is_this),
            ("permission_yes", self.permission_yes),
            ("permission_no", self.permission_no),
            ("guarded", self.guarded),
            ("confirm_yes", self.confirm_yes),
            ("resonance", self.resonance),
            ("hesitation", self.hesitation),
            ("schedule", self.schedule),
        ];
        for (name, set) in pairs {
            if set {
                out.push(name);
            }
        }
        out
    }
}

/// Phrase lists per intent. Entries wrapped in spaces require word
/// boundaries; bare entries match as substrings.
struct IntentPatterns {
    no_time: &'static [&'static str],
    just_tell: &'static [&'static str],
    hostile: &'static [&'static str],
    not_interested: &'static [&'static str],
    tech_issue: &'static [&'static str],
    who_is_this: &'static [&'static str],
    permission_yes: &'static [&'static str],
    permission_no: &'static [&'static str],
    guarded: &'static [&'static str],
    confirm_yes: &'static [&'static str],
    resonance: &'static [&'static str],
    hesitation: &'static [&'static str],
    schedule: &'static [&'static str],
}

static PATTERNS: IntentPatterns = IntentPatterns {
    no_time: &[
        "no time",
        "not a good time",
        "bad time",
        "in a meeting",
        "can't talk",
        "cannot talk",
        "busy right now",
        "really busy",
        " driving ",
        "call me later",
        "call back later",
    ],
    just_tell: &[
        "just tell me",
        "get to the point",
        "cut to the chase",
        "what do you want",
        "what is this about",
        "make it quick",
    ],
    hostile: &[
        "stop calling",
        " scam",
        "leave me alone",
        "take me off",
        "remove me from",
        "don't call me",
        "do not call",
        "harass",
        "how dare you",
    ],
    not_interested: &[
        "not interested",
        "no thanks",
        "no thank you",
        "don't need",
        "do not need",
        "we're good",
        "we are good",
        "not for us",
        "no interest",
    ],
    tech_issue: &[
        "can't hear",
        "cannot hear",
        "breaking up",
        "bad connection",
        "cutting out",
        "are you there",
        "say that again",
        "didn't catch",
        "did not catch",
        "you're cutting",
        " static ",
    ],
    who_is_this: &[
        "who is this",
        "who's this",
        "who are you",
        "what company",
        "where are you calling from",
        "who am i speaking",
    ],
    permission_yes: &[
        "go ahead",
        " sure ",
        " okay ",
        " ok ",
        " yes ",
        " yeah ",
        " yep ",
        " fine ",
        "alright",
        "sounds good",
        "i'm listening",
        "i am listening",
    ],
    permission_no: &[
        " no ",
        " nope ",
        "rather not",
        "i'd rather not",
        "please don't",
        "not really",
        "i don't think so",
    ],
    guarded: &[
        "why do you ask",
        "none of your business",
        "it depends",
        "rather not say",
        "why do you want to know",
        "that's private",
    ],
    confirm_yes: &[
        "exactly",
        "that's right",
        "that is right",
        "correct",
        " yes ",
        " yep ",
        " yeah ",
        " right ",
        " true ",
        "spot on",
    ],
    resonance: &[
        "makes sense",
        "interesting",
        "that resonates",
        "i like that",
        "tell me more",
        "sounds useful",
        "sounds interesting",
        "we struggle with",
        "good point",
    ],
    hesitation: &[
        "not sure",
        " maybe ",
        "i'll think",
        "need to think",
        "let me think",
        " hmm ",
        "i don't know",
        "i do not know",
        "hard to say",
        "have to check",
    ],
    schedule: &[
        "schedule",
        " demo ",
        " a meeting ",
        "calendar",
        "set up a call",
        "set up a demo",
        "book a",
        "next week",
        "next tuesday",
        "follow up call",
        "send an invite",
    ],
};

/// Objection phrases, used by routing in the presentation states.
///
/// Objections are not one of the thirteen intent flags; they are a
/// separate signal because they only reroute in S6/S7.
static OBJECTION_PATTERNS: &[&str] = &[
    "already use",
    "already have",
    "we use ",
    "happy with",
    "too expensive",
    "costs too much",
    "not in the budget",
    "no budget",
    "too risky",
    "concern",
    "worried about",
    "what about security",
    "switching costs",
];

fn any_match(padded: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| padded.contains(p))
}

/// Normalized, punctuation-stripped, space-padded text for phrase
/// matching. Word-bounded patterns like `" no "` rely on the padding.
pub(crate) fn match_text(text: &str) -> String {
    let normalized = normalize(text);
    let stripped: String = normalized
        .chars()
        .map(|c| {
            if matches!(c, ',' | '.' | '!' | '?' | ';' | ':') {
                ' '
            } else {
                c
            }
        })
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(" {collapsed} ")
}

/// Detect an objection in a (raw) utterance
pub fn detect_objection(text: &str) -> bool {
    any_match(&match_text(text), OBJECTION_PATTERNS)
}

/// Single-pass intent classifier
///
/// Construction is free beyond the static tables; keep one per process.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentDetector;

impl IntentDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify one utterance
    pub fn detect(&self, text: &str) -> IntentFlags {
        let padded = match_text(text);
        if padded.trim().is_empty() {
            return IntentFlags::default();
        }
        let p = &PATTERNS;

        IntentFlags {
            no_time: any_match(&padded, p.no_time),
            just_tell: any_match(&padded, p.just_tell),
            hostile: any_match(&padded, p.hostile),
            not_interested: any_match(&padded, p.not_interested),
            tech_issue: any_match(&padded, p.tech_issue),
            who_is_this: any_match(&padded, p.who_is_this),
            permission_yes: any_match(&padded, p.permission_yes),
            permission_no: any_match(&padded, p.permission_no),
            guarded: any_match(&padded, p.guarded),
            confirm_yes: any_match(&padded, p.confirm_yes),
            resonance: any_match(&padded, p.resonance),
            hesitation: any_match(&padded, p.hesitation),
            schedule: any_match(&padded, p.schedule),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_permission_granted() {
        let d = IntentDetector::new();
        let flags = d.detect("sure, go ahead");
        assert!(flags.permission_yes);
        assert!(!flags.permission_no);
    }

    #[test]
    fn test_hostile_and_not_interested_together() {
        let d = IntentDetector::new();
        let flags = d.detect("stop calling me you scammers");
        assert!(flags.hostile);
        assert!(flags.hard_exit());
    }

    #[test]
    fn test_word_boundary_no() {
        let d = IntentDetector::new();
        assert!(d.detect("no").permission_no);
        assert!(!d.detect("i know the answer").permission_no);
    }

    #[test]
    fn test_tech_issue() {
        let d = IntentDetector::new();
        assert!(d.detect("sorry you're breaking up").tech_issue);
        assert!(d.detect("I can't hear you").tech_issue);
    }

    #[test]
    fn test_schedule() {
        let d = IntentDetector::new();
        let flags = d.detect("can we set up a demo next Tuesday?");
        assert!(flags.schedule);
    }

    #[test]
    fn test_who_is_this() {
        let d = IntentDetector::new();
        assert!(d.detect("sorry, who is this?").who_is_this);
    }

    #[test]
    fn test_empty_utterance_sets_nothing() {
        let d = IntentDetector::new();
        assert_eq!(d.detect(""), IntentFlags::default());
        assert_eq!(d.detect("   "), IntentFlags::default());
    }

    #[test]
    fn test_multiple_intents_fire() {
        let d = IntentDetector::new();
        let flags = d.detect("yes exactly, that makes sense");
        assert!(flags.confirm_yes);
        assert!(flags.resonance);
    }

    #[test]
    fn test_objection_detection() {
        assert!(detect_objection("we already use Competitor X"));
        assert!(detect_objection("that sounds too expensive"));
        assert!(!detect_objection("tell me more about pricing tiers"));
    }

    #[test]
    fn test_active_names() {
        let d = IntentDetector::new();
        let names = d.detect("who is this").active();
        assert_eq!(names, vec!["who_is_this"]);
    }

    #[test]
    fn test_detection_is_fast() {
        let d = IntentDetector::new();
        let utterance = "well honestly we are quite busy right now but maybe \
                         tell me more about what you do and how it works"
            .repeat(4);
        let utterance: String = utterance.chars().take(500).collect();
        let start = Instant::now();
        for _ in 0..100 {
            let _ = d.detect(&utterance);
        }
        // 100 passes well under 50ms leaves a single pass far below 0.5ms.
        assert!(start.elapsed().as_millis() < 50);
    }
}
