//! On-device recognition backend: chunked synchronous windows.
//!
//! The underlying recognizer works best on short spans, and a failure in
//! one span should not lose the whole transcript, so audio is cut into
//! fixed 60-second windows processed strictly in order. The recognizer is
//! an opaque engine behind [`SpeechRecognizer`]; enable the
//! `recognizer-vosk` feature for a Vosk-backed implementation.

use super::audio_extract::convert_to_pcm16k;
use super::backend::{ProgressSink, TranscribeError, TranscriptionBackend};
use crate::transcript::{group_words, RecognizedWord, TranscriptSegment};
use async_trait::async_trait;
use log::{debug, warn};
use std::path::Path;
use std::sync::Arc;

pub const WINDOW_SECONDS: f64 = 60.0;
const SAMPLE_RATE: u32 = 16_000;

/// One fixed-size window of work, in seconds from the start of the audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub start: f64,
    pub duration: f64,
}

/// Partition a duration into 60-second windows; the final window takes the
/// remainder. Durations sum to the input exactly.
pub fn calculate_chunks(total_seconds: f64) -> Vec<ChunkSpan> {
    let mut chunks = Vec::new();
    if !total_seconds.is_finite() {
        return chunks;
    }
    let mut start = 0.0;
    while start < total_seconds {
        let duration = (total_seconds - start).min(WINDOW_SECONDS);
        chunks.push(ChunkSpan { start, duration });
        start += duration;
    }
    chunks
}

/// Final (non-partial) recognition output for one window. Word offsets are
/// relative to the window start.
#[derive(Debug, Clone, Default)]
pub struct WindowResult {
    pub words: Vec<RecognizedWord>,
    /// Flat transcript of the window; used when no word-level results came
    /// back so the window's content is not dropped.
    pub text: String,
}

/// Opaque speech recognition engine fed 16 kHz mono 16-bit samples.
pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool;

    fn recognize(
        &self,
        samples: &[i16],
        language: Option<&str>,
    ) -> Result<WindowResult, TranscribeError>;
}

pub struct OnDeviceBackend {
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl OnDeviceBackend {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self { recognizer }
    }

    /// Run the window loop over raw samples. Split out from `transcribe` so
    /// the loop is exercisable without ffmpeg.
    async fn recognize_windows(
        &self,
        samples: Vec<i16>,
        language: Option<&str>,
        progress: &ProgressSink,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        let total_seconds = samples.len() as f64 / SAMPLE_RATE as f64;
        let chunks = calculate_chunks(total_seconds);
        let total = chunks.len();
        debug!("[on-device] {:.1}s of audio, {} windows", total_seconds, total);

        let mut segments = Vec::new();
        let mut failed_windows = 0usize;
        let mut last_error: Option<TranscribeError> = None;

        for (i, chunk) in chunks.iter().enumerate() {
            progress.emit(
                i as f64 / total as f64,
                &format!("Recognizing window {} of {}", i + 1, total),
            );

            let lo = (chunk.start * SAMPLE_RATE as f64) as usize;
            let hi = ((chunk.start + chunk.duration) * SAMPLE_RATE as f64) as usize;
            let window: Vec<i16> = samples[lo..hi.min(samples.len())].to_vec();

            let recognizer = self.recognizer.clone();
            let lang = language.map(String::from);
            let result = tokio::task::spawn_blocking(move || {
                recognizer.recognize(&window, lang.as_deref())
            })
            .await
            .map_err(|e| TranscribeError::TranscriptionFailed(e.to_string()))?;

            match result {
                Ok(win) if !win.words.is_empty() => {
                    segments.extend(group_words(&win.words, chunk.start));
                }
                Ok(win) if !win.text.trim().is_empty() => {
                    // No word timings came back; keep the window's content
                    // as one segment at the window start.
                    segments.push(TranscriptSegment::new(win.text.trim(), chunk.start, 1.0));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("[on-device] window {} failed: {}", i + 1, e);
                    failed_windows += 1;
                    last_error = Some(e);
                }
            }
        }

        if total > 0 && failed_windows == total {
            return Err(last_error
                .unwrap_or_else(|| TranscribeError::TranscriptionFailed("all windows failed".into())));
        }

        progress.emit(1.0, "Recognition complete");
        Ok(segments)
    }
}

#[async_trait]
impl TranscriptionBackend for OnDeviceBackend {
    fn id(&self) -> &'static str {
        "on-device"
    }

    fn display_name(&self) -> &'static str {
        "On-device recognition"
    }

    fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["en", "de", "es", "fr", "it", "pt", "nl", "ru", "zh", "ja"]
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
        progress: &ProgressSink,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        if !self.recognizer.is_available() {
            return Err(TranscribeError::RecognizerUnavailable);
        }
        progress.emit(0.0, "Preparing audio");

        let pcm = convert_to_pcm16k(audio_path).await?;
        let samples = read_pcm_samples(&pcm);
        let _ = std::fs::remove_file(&pcm);

        self.recognize_windows(samples?, language, progress).await
    }
}

/// Read all samples from a 16 kHz mono 16-bit WAV file.
fn read_pcm_samples(path: &Path) -> Result<Vec<i16>, TranscribeError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| TranscribeError::ExtractionFailed(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE || spec.channels != 1 || spec.bits_per_sample != 16 {
        return Err(TranscribeError::ExtractionFailed(format!(
            "expected 16kHz mono 16-bit, got {}Hz {}ch {}bit",
            spec.sample_rate, spec.channels, spec.bits_per_sample
        )));
    }
    reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TranscribeError::ExtractionFailed(e.to_string()))
}
