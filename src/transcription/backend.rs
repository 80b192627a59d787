//! Transcription backend trait, error taxonomy, and progress reporting.

use crate::transcript::TranscriptSegment;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Failure modes of extraction and transcription, distinguishable by the
/// caller. None of these are retried; configuration and resource errors are
/// recoverable by user action (add a key, download a model, pick another
/// file).
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("the selected file has no audio track")]
    NoAudioTrack,
    #[error("audio extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("the speech recognizer is not available on this system")]
    RecognizerUnavailable,
    #[error("no API key is configured; add one in settings to use the cloud backend")]
    MissingApiKey,
    #[error("{0} is not configured; set it in settings")]
    NotConfigured(&'static str),
    #[error("model '{0}' is not downloaded; download it before transcribing")]
    ModelNotDownloaded(String),
    #[error("whisper-cli was not found; install it or point settings at the binary")]
    ModelRuntimeMissing,
    #[error("audio upload failed: {0}")]
    UploadFailed(String),
    #[error("transcription job submission failed: {0}")]
    SubmissionFailed(String),
    #[error("status poll failed: {0}")]
    PollFailed(String),
    #[error("status polling gave up after {0} attempts")]
    PollLimitExceeded(u32),
    #[error("the provider reported completion without transcript data")]
    NoTranscriptData,
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("transcription timed out after {0} seconds")]
    TranscriptionTimeout(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Progress sink passed into each backend call.
///
/// Enforces the delivery contract: fractions are clamped to [0, 1] and
/// never move backwards within one call, and observer failures never abort
/// the transcription. Cloning shares the same monotonic state, so a ticker
/// task and the owning backend cannot race progress backwards.
#[derive(Clone)]
pub struct ProgressSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    observer: Box<dyn Fn(f64, &str) + Send + Sync>,
    last: Mutex<f64>,
}

impl ProgressSink {
    pub fn new(observer: impl Fn(f64, &str) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                observer: Box::new(observer),
                last: Mutex::new(0.0),
            }),
        }
    }

    /// A sink that drops everything. Handy for tests and fire-and-forget use.
    pub fn discard() -> Self {
        Self::new(|_, _| {})
    }

    /// Report progress. Fractions below the last reported value are raised
    /// to it so delivery stays non-decreasing.
    pub fn emit(&self, fraction: f64, status: &str) {
        let clamped = fraction.clamp(0.0, 1.0);
        let value = {
            let mut last = self.inner.last.lock().unwrap();
            if clamped > *last {
                *last = clamped;
            }
            *last
        };
        (self.inner.observer)(value, status);
    }

    /// Last fraction delivered through this sink.
    pub fn last(&self) -> f64 {
        *self.inner.last.lock().unwrap()
    }
}

/// Capability interface implemented by the three transcription providers.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    fn id(&self) -> &'static str;
    fn display_name(&self) -> &'static str;

    /// Whether the backend can run at all on this machine/configuration.
    fn is_available(&self) -> bool {
        true
    }

    /// Language codes the provider accepts, empty meaning "anything /
    /// auto-detect".
    fn supported_languages(&self) -> &'static [&'static str] {
        &[]
    }

    /// Transcribe an extracted audio file into ordered segments.
    ///
    /// `language` is a hint (ISO 639-1); `None` requests auto-detection
    /// where the provider supports it. Progress lands on `progress` with
    /// non-decreasing fractions finishing near 1.0.
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
        progress: &ProgressSink,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_is_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let sink = ProgressSink::new(move |f, _| log.lock().unwrap().push(f));

        sink.emit(0.2, "a");
        sink.emit(0.5, "b");
        sink.emit(0.3, "regression is clamped");
        sink.emit(0.9, "c");

        assert_eq!(*seen.lock().unwrap(), vec![0.2, 0.5, 0.5, 0.9]);
        assert_eq!(sink.last(), 0.9);
    }

    #[test]
    fn sink_clamps_to_unit_interval() {
        let sink = ProgressSink::discard();
        sink.emit(-3.0, "low");
        assert_eq!(sink.last(), 0.0);
        sink.emit(7.0, "high");
        assert_eq!(sink.last(), 1.0);
    }

    #[test]
    fn clones_share_monotonic_state() {
        let sink = ProgressSink::discard();
        let ticker = sink.clone();
        ticker.emit(0.6, "ticker");
        sink.emit(0.4, "owner");
        assert_eq!(sink.last(), 0.6);
    }
}
