//! Reply cleaning for voice output
//!
//! LLM output occasionally arrives with speaker labels, quotes, or more
//! text than fits a spoken turn. The cleaner strips the framing, collapses
//! whitespace, and truncates on a sentence boundary so the spoken reply
//! stays under roughly twelve seconds (~55 words).

use unicode_segmentation::UnicodeSegmentation;

use salesline_llm::split_sentences;

/// Soft cap on spoken words per reply
pub const MAX_REPLY_WORDS: usize = 55;

const SPEAKER_LABELS: [&str; 6] = ["agent:", "assistant:", "ai:", "alex:", "reply:", "response:"];

/// Clean one reply for speech
pub fn clean_reply(raw: &str) -> String {
    let mut text = raw.trim();

    // Strip a leading speaker label.
    let lowered = text.to_lowercase();
    for label in SPEAKER_LABELS {
        if lowered.starts_with(label) {
            text = text[label.len()..].trim_start();
            break;
        }
    }

    // Strip symmetric surrounding quotes.
    let text = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);

    // Collapse whitespace.
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    truncate_on_sentence(&collapsed, MAX_REPLY_WORDS)
}

fn word_count(s: &str) -> usize {
    s.unicode_words().count()
}

/// Keep whole sentences up to the word cap. The first sentence is always
/// kept; if it alone exceeds the cap it is cut at the cap.
fn truncate_on_sentence(text: &str, max_words: usize) -> String {
    if word_count(text) <= max_words {
        return text.to_string();
    }

    let mut kept = String::new();
    let mut words = 0usize;
    for sentence in split_sentences(text) {
        let sentence_words = word_count(sentence);
        if kept.is_empty() {
            if sentence_words > max_words {
                // A single runaway sentence: hard cut at the cap.
                let cut: Vec<&str> = sentence.unicode_words().take(max_words).collect();
                return cut.join(" ");
            }
            kept.push_str(sentence);
            words = sentence_words;
            continue;
        }
        if words + sentence_words > max_words {
            break;
        }
        kept.push(' ');
        kept.push_str(sentence);
        words += sentence_words;
    }
    kept
}
