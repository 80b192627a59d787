//! In-memory transcript editing session.

use super::TranscriptSegment;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("segment index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("split point must fall strictly inside the segment text")]
    InvalidSplitPoint,
    #[error("start offset must be a non-negative number")]
    InvalidTimestamp,
}

/// Assumed spoken length of a segment when no following segment bounds it.
const DEFAULT_SEGMENT_SECONDS: f64 = 2.0;

/// Owns a segment sequence and applies edit operations to it.
///
/// Operations keep insertion order; they do not re-sort by timestamp, so a
/// retime can leave the sequence non-monotonic. That is tolerated (callers
/// can check with [`crate::transcript::is_monotonic`]).
pub struct TranscriptEditor {
    segments: Vec<TranscriptSegment>,
}

impl TranscriptEditor {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<TranscriptSegment> {
        self.segments
    }

    fn check_index(&self, index: usize) -> Result<(), EditError> {
        if index >= self.segments.len() {
            return Err(EditError::OutOfRange {
                index,
                len: self.segments.len(),
            });
        }
        Ok(())
    }

    /// Join segment `index` with the one after it. The merged segment keeps
    /// the left segment's id and start; confidence is the mean of the two.
    pub fn merge_with_next(&mut self, index: usize) -> Result<(), EditError> {
        self.check_index(index)?;
        self.check_index(index + 1)?;
        let right = self.segments.remove(index + 1);
        let left = &mut self.segments[index];
        left.text = format!("{} {}", left.text.trim_end(), right.text.trim_start());
        left.confidence = (left.confidence + right.confidence) / 2.0;
        Ok(())
    }

    /// Split segment `index` at character position `at` into two segments,
    /// both with fresh ids. The second segment's start is interpolated
    /// proportionally between this segment's start and the next one's (or a
    /// fixed default span when this is the last segment).
    pub fn split(&mut self, index: usize, at: usize) -> Result<(), EditError> {
        self.check_index(index)?;
        let original = &self.segments[index];
        if at == 0 || at >= original.text.len() || !original.text.is_char_boundary(at) {
            return Err(EditError::InvalidSplitPoint);
        }
        let (head, tail) = original.text.split_at(at);
        let head = head.trim().to_string();
        let tail = tail.trim().to_string();
        if head.is_empty() || tail.is_empty() {
            return Err(EditError::InvalidSplitPoint);
        }

        let span = self
            .segments
            .get(index + 1)
            .map(|next| (next.start_offset - original.start_offset).max(0.0))
            .unwrap_or(DEFAULT_SEGMENT_SECONDS);
        let fraction = at as f64 / original.text.len() as f64;
        let start = original.start_offset;
        let confidence = original.confidence;

        let first = TranscriptSegment::new(head, start, confidence);
        let second = TranscriptSegment::new(tail, start + span * fraction, confidence);
        self.segments.splice(index..=index, [first, second]);
        Ok(())
    }

    /// Move segment `index` to a new start offset. The id is kept.
    pub fn retime(&mut self, index: usize, new_start: f64) -> Result<(), EditError> {
        self.check_index(index)?;
        if !new_start.is_finite() || new_start < 0.0 {
            return Err(EditError::InvalidTimestamp);
        }
        self.segments[index].start_offset = new_start;
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<TranscriptSegment, EditError> {
        self.check_index(index)?;
        Ok(self.segments.remove(index))
    }

    /// Case-insensitive substring search over segment text.
    pub fn search(&self, query: &str) -> Vec<usize> {
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.text.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect()
    }
}
