//! Transcript segments and in-memory editing.

mod editor;
mod normalize;

use serde::{Deserialize, Serialize};

pub use editor::{EditError, TranscriptEditor};
pub use normalize::{group_words, RecognizedWord, MAX_WORDS_PER_SEGMENT};

/// A single transcribed segment with timing and confidence.
///
/// The `id` is stable across edits unless the segment is replaced
/// (split produces two new segments; merge keeps the left-hand id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: String,
    pub text: String,
    /// Seconds from the start of the source media.
    pub start_offset: f64,
    /// Backend-reported confidence in [0, 1]; 1.0 when the backend has none.
    pub confidence: f32,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_offset: f64, confidence: f32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            start_offset,
            confidence,
        }
    }
}

/// Whether the sequence is ordered by non-decreasing start offset.
/// Holds for orchestrator output by construction; user edits may break it
/// and that is tolerated rather than re-sorted.
pub fn is_monotonic(segments: &[TranscriptSegment]) -> bool {
    segments
        .windows(2)
        .all(|w| w[0].start_offset <= w[1].start_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_ids_are_unique() {
        let a = TranscriptSegment::new("one", 0.0, 1.0);
        let b = TranscriptSegment::new("two", 1.0, 1.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn monotonic_detection() {
        let ordered = vec![
            TranscriptSegment::new("a", 0.0, 1.0),
            TranscriptSegment::new("b", 2.0, 1.0),
            TranscriptSegment::new("c", 2.0, 1.0),
        ];
        assert!(is_monotonic(&ordered));

        let mut edited = ordered;
        edited[2].start_offset = 1.0;
        assert!(!is_monotonic(&edited));
    }
}
