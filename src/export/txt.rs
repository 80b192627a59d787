//! Plain-text transcript writer.

use super::ExportError;
use crate::transcript::TranscriptSegment;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Format a segment offset as [MM:SS] (hours roll into minutes).
fn format_offset(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("[{:02}:{:02}]", total / 60, total % 60)
}

pub fn write_txt(
    path: &Path,
    source_name: &str,
    segments: &[TranscriptSegment],
) -> Result<(), ExportError> {
    let mut file = File::create(path)?;

    writeln!(
        file,
        "Transcript of {} - {}",
        source_name,
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    )?;
    writeln!(file)?;

    for seg in segments {
        writeln!(file, "{} {}", format_offset(seg.start_offset), seg.text)?;
    }

    Ok(())
}
