//! Drives the full extract → transcribe → normalize pipeline.

use crate::config::{BackendKind, Settings};
use crate::credentials::{CredentialStore, CLOUD_API_KEY};
use crate::records::TranscriptionRecord;
use crate::transcription::{
    extract_audio, probe_duration, CloudBackend, HttpCloudApi, LocalModelBackend, OnDeviceBackend,
    ProgressSink, SpeechRecognizer, TranscribeError, TranscriptionBackend,
};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ExtractingAudio,
    Transcribing,
    Completed,
    Failed,
}

/// Single-valued progress/status of the one transcription this
/// orchestrator may be running.
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    pub phase: Phase,
    pub progress: f64,
    pub status: String,
}

/// Build the configured backend. Configuration problems surface here as
/// the same typed errors the backends use, before any work starts.
pub fn build_backend(
    settings: &Settings,
    credentials: &CredentialStore,
    models_dir: &Path,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
) -> Result<Box<dyn TranscriptionBackend>, TranscribeError> {
    match settings.backend {
        BackendKind::OnDevice => {
            let recognizer = recognizer.ok_or(TranscribeError::RecognizerUnavailable)?;
            Ok(Box::new(OnDeviceBackend::new(recognizer)))
        }
        BackendKind::Cloud => {
            if settings.cloud_base_url.trim().is_empty() {
                return Err(TranscribeError::NotConfigured("cloud endpoint"));
            }
            let api_key = credentials
                .get(CLOUD_API_KEY)
                .ok()
                .flatten()
                .filter(|k| !k.trim().is_empty())
                .ok_or(TranscribeError::MissingApiKey)?;
            let api = HttpCloudApi::new(settings.cloud_base_url.clone(), api_key);
            Ok(Box::new(CloudBackend::new(Box::new(api))))
        }
        BackendKind::LocalModel => Ok(Box::new(LocalModelBackend::new(
            models_dir,
            settings.model_variant,
        ))),
    }
}

pub struct TranscriptionOrchestrator {
    backend: Box<dyn TranscriptionBackend>,
    language: Option<String>,
    state: Arc<Mutex<OrchestratorState>>,
}

impl TranscriptionOrchestrator {
    pub fn new(backend: Box<dyn TranscriptionBackend>, language: Option<String>) -> Self {
        Self {
            backend,
            language,
            state: Arc::new(Mutex::new(OrchestratorState {
                phase: Phase::Idle,
                progress: 0.0,
                status: String::new(),
            })),
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state.lock().unwrap().clone()
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    fn set_phase(&self, phase: Phase, progress: f64, status: &str) {
        let mut state = self.state.lock().unwrap();
        state.phase = phase;
        state.progress = progress;
        state.status = status.to_string();
    }

    fn fail(&self, error: &TranscribeError) {
        self.set_phase(Phase::Failed, 0.0, &error.to_string());
    }

    /// Transcribe a video file. Takes `&mut self`: one transcription runs
    /// to completion before another may start on this instance.
    ///
    /// The extracted temp audio is deleted on every exit path, success or
    /// failure, best-effort.
    pub async fn transcribe(
        &mut self,
        video: &Path,
        observer: impl Fn(f64, &str) + Send + Sync + 'static,
    ) -> Result<TranscriptionRecord, TranscribeError> {
        info!(
            "[orchestrator] transcribing {} via {}",
            video.display(),
            self.backend.id()
        );
        self.set_phase(Phase::ExtractingAudio, 0.0, "Extracting audio");

        let video_duration = match probe_duration(video).await {
            Ok(d) => d,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        let audio = match extract_audio(video).await {
            Ok(path) => path,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        debug!("[orchestrator] audio extracted to {}", audio.display());

        let result = self
            .run_backend(&audio, video, video_duration, observer)
            .await;

        if let Err(e) = std::fs::remove_file(&audio) {
            warn!(
                "[orchestrator] could not remove temp audio {}: {}",
                audio.display(),
                e
            );
        }
        result
    }

    async fn run_backend(
        &mut self,
        audio: &Path,
        source: &Path,
        video_duration: f64,
        observer: impl Fn(f64, &str) + Send + Sync + 'static,
    ) -> Result<TranscriptionRecord, TranscribeError> {
        let preparing = format!("Preparing {}", self.backend.display_name());
        self.set_phase(Phase::Transcribing, 0.0, &preparing);

        // Forward backend callbacks verbatim; each backend owns its own
        // 0..1 scale. The shared state mirrors the latest value so the
        // caller can also poll.
        let state = self.state.clone();
        let sink = ProgressSink::new(move |fraction, status| {
            {
                let mut s = state.lock().unwrap();
                s.progress = fraction;
                s.status = status.to_string();
            }
            observer(fraction, status);
        });
        sink.emit(0.0, &preparing);

        let started = Instant::now();
        match self
            .backend
            .transcribe(audio, self.language.as_deref(), &sink)
            .await
        {
            Ok(segments) => {
                let elapsed = started.elapsed().as_secs_f64();
                self.set_phase(Phase::Completed, 1.0, "Transcription complete");
                info!(
                    "[orchestrator] {} segments in {:.1}s",
                    segments.len(),
                    elapsed
                );
                Ok(TranscriptionRecord::new(
                    source.to_string_lossy().into_owned(),
                    segments,
                    video_duration,
                    elapsed,
                ))
            }
            Err(e) => {
                warn!("[orchestrator] transcription failed: {}", e);
                self.fail(&e);
                Err(e)
            }
        }
    }
}
