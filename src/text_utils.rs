/*!
 * Text helpers shared by synthesis and captioning.
 *
 * - `split_sentences`: punctuation-driven sentence splitting
 * - `clean_for_speech`: strip characters a speech backend would read aloud
 * - `estimate_duration_ms`: reading-speed duration estimate
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Assumed reading speed for duration estimates
pub const CHARS_PER_MINUTE: u64 = 300;

/// Characters that end a sentence unconditionally
const TERMINALS: [char; 8] = ['。', '！', '？', '；', '!', '?', ';', '…'];

static REFERENCE_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\(\[（【]\d+[\)\]）】]$").expect("valid reference regex")
});

static SPEECH_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[_/\\|~*#%>\-”“"]"#).expect("valid noise regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Number of characters (not bytes) in a text
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Estimated spoken duration of a text in milliseconds
pub fn estimate_duration_ms(text: &str) -> u64 {
    char_count(text) as u64 * 60_000 / CHARS_PER_MINUTE
}

/// Splits text into sentence-like units.
///
/// A boundary falls after any terminal mark, and after `.` only when the next
/// character is not an ASCII letter or digit, so `1.7` and `e.g.` stay whole.
/// Fragments consisting only of a bracketed number are appended to the
/// previous sentence. Non-empty input without terminals comes back as one
/// element; blank input yields an empty list.
pub fn split_sentences(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut fragments: Vec<&str> = Vec::new();
    let mut start = 0;
    let mut iter = trimmed.char_indices().peekable();
    while let Some((pos, c)) = iter.next() {
        let end = pos + c.len_utf8();
        let boundary = if TERMINALS.contains(&c) {
            true
        } else if c == '.' {
            !matches!(iter.peek(), Some((_, next)) if next.is_ascii_alphanumeric())
        } else {
            false
        };
        if boundary {
            fragments.push(&trimmed[start..end]);
            start = end;
        }
    }
    if start < trimmed.len() {
        fragments.push(&trimmed[start..]);
    }

    let mut sentences: Vec<String> = Vec::new();
    for fragment in fragments.into_iter().map(str::trim).filter(|f| !f.is_empty()) {
        match sentences.last_mut() {
            Some(previous) if REFERENCE_ONLY.is_match(fragment) => {
                previous.push(' ');
                previous.push_str(fragment);
            }
            _ => sentences.push(fragment.to_string()),
        }
    }

    if sentences.is_empty() {
        vec![trimmed.to_string()]
    } else {
        sentences
    }
}

/// Replaces formatting characters with spaces and collapses whitespace
pub fn clean_for_speech(text: &str) -> String {
    let replaced = SPEECH_NOISE.replace_all(text, " ");
    WHITESPACE.replace_all(&replaced, " ").trim().to_string()
}
