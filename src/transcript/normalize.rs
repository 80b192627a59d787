//! Group word-level recognition output into sentence-like segments.
//!
//! Every backend produces words (or an equivalent token stream) with
//! per-word timing and confidence; this module turns them into the
//! canonical segment shape so output density is the same regardless of
//! provider.

use super::TranscriptSegment;

/// A single recognized word with its offset and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedWord {
    pub text: String,
    /// Seconds relative to the audio the recognizer was given.
    pub start_offset: f64,
    pub confidence: f32,
}

impl RecognizedWord {
    pub fn new(text: impl Into<String>, start_offset: f64, confidence: f32) -> Self {
        Self {
            text: text.into(),
            start_offset,
            confidence,
        }
    }
}

/// Segments are closed once they accumulate this many words.
pub const MAX_WORDS_PER_SEGMENT: usize = 10;

fn ends_sentence(word: &str) -> bool {
    word.ends_with('.') || word.ends_with('!') || word.ends_with('?')
}

/// Group an ordered word list into segments.
///
/// A segment closes when it reaches [`MAX_WORDS_PER_SEGMENT`] words, when a
/// word ends in sentence punctuation, or at the end of the list. Segment
/// start is its first word's offset plus `base_offset`; confidence is the
/// arithmetic mean of the word confidences.
pub fn group_words(words: &[RecognizedWord], base_offset: f64) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut current: Vec<&RecognizedWord> = Vec::new();

    for word in words {
        current.push(word);
        if current.len() >= MAX_WORDS_PER_SEGMENT || ends_sentence(&word.text) {
            segments.push(close_segment(&current, base_offset));
            current.clear();
        }
    }
    if !current.is_empty() {
        segments.push(close_segment(&current, base_offset));
    }
    segments
}

fn close_segment(words: &[&RecognizedWord], base_offset: f64) -> TranscriptSegment {
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let confidence = if words.is_empty() {
        1.0
    } else {
        words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
    };
    let start = words.first().map(|w| w.start_offset).unwrap_or(0.0);
    TranscriptSegment::new(text, base_offset + start, confidence)
}
