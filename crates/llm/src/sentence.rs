//! Sentence boundary detection for streaming output
//!
//! A sentence ends at `.`, `!` or `?` followed by whitespace (or end of
//! text). The first boundary in the token stream triggers the TTS overlap,
//! so the scan must be cheap and incremental-friendly.

/// Sentence-ending punctuation
const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Byte offset one past the first sentence terminator that is followed by
/// whitespace, or `None` if the text holds no complete sentence yet.
///
/// A terminator at end-of-text does not count: a streaming chunk may end
/// mid-number ("3.") and the decision must wait for the next chunk.
pub fn first_boundary(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if TERMINATORS.contains(&c) {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    return Some(i + c.len_utf8());
                }
            }
        }
    }
    None
}

/// The first complete sentence, trimmed, if one has fully arrived
pub fn first_sentence(text: &str) -> Option<&str> {
    first_boundary(text).map(|end| text[..end].trim())
}

/// Split text into complete sentences; a trailing fragment without a
/// terminator is kept as the last element
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(end) = first_boundary(rest) {
        let sentence = rest[..end].trim();
        if !sentence.is_empty() {
            out.push(sentence);
        }
        rest = &rest[end..];
    }
    let tail = rest.trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}
