//! Cloud transcription backend: upload, submit, then poll until done.
//!
//! The provider protocol is three HTTP calls behind [`CloudApi`]: POST the
//! raw audio bytes (returns an upload URL), POST a job referencing that URL
//! and a language code (returns a job id), then GET the job status on a
//! fixed interval until it completes or fails. The provider reports no
//! fractional progress, so the poll loop advances a liveness estimate that
//! never claims more than 0.95 before completion.

use super::backend::{ProgressSink, TranscribeError, TranscriptionBackend};
use crate::transcript::{group_words, RecognizedWord, TranscriptSegment};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
/// 200 polls at 3 s is ten minutes of "processing" before giving up.
pub const MAX_POLL_ATTEMPTS: u32 = 200;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// One word of the completed transcript, offsets in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudWord {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
}

/// Body of a poll response.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub words: Option<Vec<CloudWord>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The provider's wire surface; the state machine above it is the part
/// worth testing, so it is drivable with a scripted implementation.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn upload(&self, audio_path: &Path) -> Result<String, TranscribeError>;
    async fn submit(&self, audio_url: &str, language: &str) -> Result<String, TranscribeError>;
    async fn poll(&self, job_id: &str) -> Result<JobStatus, TranscribeError>;
}

/// Real provider client over reqwest.
pub struct HttpCloudApi {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpCloudApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CloudApi for HttpCloudApi {
    async fn upload(&self, audio_path: &Path) -> Result<String, TranscribeError> {
        let bytes = std::fs::read(audio_path)
            .map_err(|e| TranscribeError::UploadFailed(e.to_string()))?;
        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .header("authorization", &self.api_key)
            .body(bytes)
            .send()
            .await
            .map_err(|e| TranscribeError::UploadFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TranscribeError::UploadFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::UploadFailed(e.to_string()))?;
        Ok(body.upload_url)
    }

    async fn submit(&self, audio_url: &str, language: &str) -> Result<String, TranscribeError> {
        let response = self
            .client
            .post(format!("{}/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&serde_json::json!({
                "audio_url": audio_url,
                "language_code": language,
            }))
            .send()
            .await
            .map_err(|e| TranscribeError::SubmissionFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TranscribeError::SubmissionFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::SubmissionFailed(e.to_string()))?;
        Ok(body.id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus, TranscribeError> {
        let response = self
            .client
            .get(format!("{}/transcript/{}", self.base_url, job_id))
            .header("authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| TranscribeError::PollFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TranscribeError::PollFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| TranscribeError::PollFailed(e.to_string()))
    }
}

pub struct CloudBackend {
    api: Box<dyn CloudApi>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl CloudBackend {
    pub fn new(api: Box<dyn CloudApi>) -> Self {
        Self {
            api,
            poll_interval: POLL_INTERVAL,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(api: Box<dyn CloudApi>, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        }
    }
}

fn words_to_segments(words: &[CloudWord]) -> Vec<TranscriptSegment> {
    let recognized: Vec<RecognizedWord> = words
        .iter()
        .map(|w| RecognizedWord::new(w.text.clone(), w.start_ms as f64 / 1000.0, w.confidence))
        .collect();
    group_words(&recognized, 0.0)
}

#[async_trait]
impl TranscriptionBackend for CloudBackend {
    fn id(&self) -> &'static str {
        "cloud"
    }

    fn display_name(&self) -> &'static str {
        "Cloud transcription"
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        &["en", "de", "es", "fr", "it", "pt", "nl", "hi", "ja", "zh", "ko"]
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
        progress: &ProgressSink,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        progress.emit(0.0, "Uploading audio");
        let audio_url = self.api.upload(audio_path).await?;
        progress.emit(0.2, "Audio uploaded");

        let job_id = self
            .api
            .submit(&audio_url, language.unwrap_or("en"))
            .await?;
        progress.emit(0.25, "Job submitted");
        debug!("[cloud] job {} submitted", job_id);

        for attempt in 0..self.max_poll_attempts {
            let status = self.api.poll(&job_id).await?;
            match status.status.as_str() {
                "completed" => {
                    let words = match status.words {
                        Some(ref words) if !words.is_empty() => words,
                        // Completion without word data is a provider fault,
                        // not an empty transcript.
                        _ => return Err(TranscribeError::NoTranscriptData),
                    };
                    progress.emit(1.0, "Transcription complete");
                    return Ok(words_to_segments(words));
                }
                "error" | "failed" => {
                    return Err(TranscribeError::TranscriptionFailed(
                        status.error.unwrap_or_else(|| "provider reported failure".into()),
                    ));
                }
                // "queued" | "processing" and anything else the provider
                // may grow: keep waiting, advance the liveness estimate.
                other => {
                    debug!("[cloud] job {} status {}, attempt {}", job_id, other, attempt);
                    let estimate = 0.3
                        + 0.65 * (attempt as f64 + 1.0) / self.max_poll_attempts as f64;
                    progress.emit(estimate.min(0.95), "Processing");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(TranscribeError::PollLimitExceeded(self.max_poll_attempts))
    }
}
