//! SRT (SubRip) subtitle format writer.

use super::ExportError;
use crate::transcript::TranscriptSegment;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Tail duration for the last entry, which has no following segment to
/// take an end time from.
const LAST_ENTRY_SECONDS: f64 = 2.0;

fn secs_to_srt_time(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    let mins = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

/// Greedy word wrap; words longer than the width get a line of their own.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line = word.to_string();
        } else if line.len() + 1 + word.len() <= width {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut line));
            line = word.to_string();
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

pub fn write_srt(
    path: &Path,
    segments: &[TranscriptSegment],
    line_width: usize,
) -> Result<(), ExportError> {
    let mut file = File::create(path)?;

    for (i, seg) in segments.iter().enumerate() {
        let end = segments
            .get(i + 1)
            .map(|next| next.start_offset)
            .unwrap_or(seg.start_offset + LAST_ENTRY_SECONDS);

        writeln!(file, "{}", i + 1)?;
        writeln!(
            file,
            "{} --> {}",
            secs_to_srt_time(seg.start_offset),
            secs_to_srt_time(end)
        )?;
        for line in wrap_text(&seg.text, line_width) {
            writeln!(file, "{}", line)?;
        }
        writeln!(file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn formats_timestamps_with_milliseconds() {
        assert_eq!(secs_to_srt_time(0.0), "00:00:00,000");
        assert_eq!(secs_to_srt_time(61.5), "00:01:01,500");
        assert_eq!(secs_to_srt_time(3725.042), "01:02:05,042");
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert!(lines.iter().all(|l| l.len() <= 15));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let lines = wrap_text("a pneumonoultramicroscopic b", 10);
        assert_eq!(lines, vec!["a", "pneumonoultramicroscopic", "b"]);
    }

    /// Parse an SRT file back into (start_seconds, text) entries.
    fn read_entries(path: &Path) -> Vec<(f64, String)> {
        let content = std::fs::read_to_string(path).unwrap();
        let mut entries = Vec::new();
        for block in content.split("\n\n").filter(|b| !b.trim().is_empty()) {
            let mut lines = block.lines();
            lines.next().unwrap(); // sequence number
            let timing = lines.next().unwrap();
            let start = timing.split(" --> ").next().unwrap();
            let parts: Vec<&str> = start.split([':', ',']).collect();
            let secs = parts[0].parse::<f64>().unwrap() * 3600.0
                + parts[1].parse::<f64>().unwrap() * 60.0
                + parts[2].parse::<f64>().unwrap()
                + parts[3].parse::<f64>().unwrap() / 1000.0;
            let text = lines.collect::<Vec<_>>().join(" ");
            entries.push((secs, text));
        }
        entries
    }

    #[test]
    fn round_trip_preserves_count_and_start_times() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.srt");
        let segments = vec![
            TranscriptSegment::new("First segment with a decent amount of text in it.", 0.0, 1.0),
            TranscriptSegment::new("Second.", 61.5, 1.0),
            TranscriptSegment::new("Third and final.", 125.25, 1.0),
        ];

        write_srt(&path, &segments, 42).unwrap();
        let entries = read_entries(&path);

        assert_eq!(entries.len(), segments.len());
        for (entry, seg) in entries.iter().zip(&segments) {
            assert!((entry.0 - seg.start_offset).abs() < 1e-3);
            assert_eq!(entry.1, rewrap(&seg.text, 42));
        }
    }

    fn rewrap(text: &str, width: usize) -> String {
        wrap_text(text, width).join(" ")
    }

    #[test]
    fn entry_end_comes_from_next_segment_start() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.srt");
        let segments = vec![
            TranscriptSegment::new("One.", 0.0, 1.0),
            TranscriptSegment::new("Two.", 3.5, 1.0),
        ];
        write_srt(&path, &segments, 42).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("00:00:00,000 --> 00:00:03,500"));
        // Final entry gets the fixed tail.
        assert!(content.contains("00:00:03,500 --> 00:00:05,500"));
    }

    #[test]
    fn empty_transcript_writes_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.srt");
        write_srt(&path, &[], 42).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
