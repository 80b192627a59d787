//! Export transcripts to plain text and SRT formats.

mod srt;
mod txt;

use crate::transcript::TranscriptSegment;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Write a plain-text transcript: header plus one timestamped line per
/// segment.
pub fn export_txt(
    path: &Path,
    source_name: &str,
    segments: &[TranscriptSegment],
) -> Result<(), ExportError> {
    txt::write_txt(path, source_name, segments)
}

/// Write a SubRip subtitle file, text word-wrapped at `line_width` columns.
pub fn export_srt(
    path: &Path,
    segments: &[TranscriptSegment],
    line_width: usize,
) -> Result<(), ExportError> {
    srt::write_srt(path, segments, line_width)
}
