//! Local model backend: drives whisper-cli as an external process.
//!
//! The model runtime reports no fractional progress, so a separate ticker
//! advances a synthetic estimate while the subprocess runs. A hard
//! wall-clock timeout kills the child when exceeded.

use super::audio_extract::convert_to_pcm16k;
use super::backend::{ProgressSink, TranscribeError, TranscriptionBackend};
use super::model_download::ModelVariant;
use crate::transcript::TranscriptSegment;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const PROGRESS_TICK: Duration = Duration::from_millis(500);
const PROGRESS_START: f64 = 0.10;
const PROGRESS_STEP: f64 = 0.018;
const PROGRESS_CAP: f64 = 0.95;
const MIN_THREADS: usize = 4;
const MAX_THREADS: usize = 10;

/// Expected shape of `<stem>.json` written by the model process.
#[derive(Debug, Deserialize)]
struct ModelOutput {
    transcription: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    offsets: ModelOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelOffsets {
    from_ms: u64,
    #[allow(dead_code)]
    to_ms: u64,
}

pub struct LocalModelBackend {
    models_dir: PathBuf,
    variant: ModelVariant,
    binary_path: Option<PathBuf>,
    timeout: Duration,
}

impl LocalModelBackend {
    pub fn new(models_dir: impl Into<PathBuf>, variant: ModelVariant) -> Self {
        Self {
            models_dir: models_dir.into(),
            variant,
            binary_path: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the whisper-cli binary (otherwise resolved from PATH).
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn model_path(&self) -> PathBuf {
        self.models_dir.join(self.variant.file_name())
    }

    fn resolve_binary(&self) -> Result<PathBuf, TranscribeError> {
        if let Some(ref path) = self.binary_path {
            return Ok(path.clone());
        }
        which::which("whisper-cli").map_err(|_| TranscribeError::ModelRuntimeMissing)
    }

    /// Run the model over an already-converted 16 kHz mono WAV file.
    async fn run_model(
        &self,
        pcm_path: &Path,
        language: Option<&str>,
        progress: &ProgressSink,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        let binary = self.resolve_binary()?;
        let output_stem = pcm_path.with_extension("");
        let json_path = pcm_path.with_extension("json");
        let args = build_args(
            &self.model_path(),
            pcm_path,
            &output_stem,
            thread_count(),
            self.variant,
            language,
        );
        debug!("[local-model] {} {:?}", binary.display(), args);

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TranscribeError::TranscriptionFailed(format!(
                "failed to start model process: {}",
                e
            )))?;

        // Drain stderr as it arrives so a chatty model cannot fill the pipe
        // and wedge against our wait below.
        let mut stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        // Synthetic progress: the model reports nothing, so tick toward the
        // cap on a fixed cadence until the process is no longer running.
        let running = Arc::new(AtomicBool::new(true));
        let ticker_running = running.clone();
        let ticker_sink = progress.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_TICK);
            interval.tick().await;
            let mut estimate = PROGRESS_START;
            ticker_sink.emit(estimate, "Running local model");
            while ticker_running.load(Ordering::Relaxed) {
                interval.tick().await;
                if !ticker_running.load(Ordering::Relaxed) {
                    break;
                }
                estimate = next_estimate(estimate);
                ticker_sink.emit(estimate, "Running local model");
            }
        });

        let wait_result = tokio::time::timeout(self.timeout, child.wait()).await;
        running.store(false, Ordering::Relaxed);

        let status = match wait_result {
            Err(_) => {
                warn!(
                    "[local-model] no exit after {}s, killing process",
                    self.timeout.as_secs()
                );
                let _ = child.kill().await;
                let _ = ticker.await;
                stderr_task.abort();
                let _ = std::fs::remove_file(&json_path);
                return Err(TranscribeError::TranscriptionTimeout(self.timeout.as_secs()));
            }
            Ok(wait) => {
                let _ = ticker.await;
                wait?
            }
        };
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let detail = String::from_utf8_lossy(&stderr);
            let detail = detail.trim();
            let _ = std::fs::remove_file(&json_path);
            return Err(TranscribeError::TranscriptionFailed(if detail.is_empty() {
                format!("exit code {}", status.code().unwrap_or(-1))
            } else {
                detail.to_string()
            }));
        }

        let json = std::fs::read_to_string(&json_path).map_err(|e| {
            TranscribeError::TranscriptionFailed(format!("model wrote no output: {}", e))
        })?;
        let _ = std::fs::remove_file(&json_path);

        let segments = parse_model_output(&json)?;
        progress.emit(1.0, "Transcription complete");
        Ok(segments)
    }
}

#[async_trait]
impl TranscriptionBackend for LocalModelBackend {
    fn id(&self) -> &'static str {
        "local-model"
    }

    fn display_name(&self) -> &'static str {
        "Local model"
    }

    fn is_available(&self) -> bool {
        self.resolve_binary().is_ok()
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        language: Option<&str>,
        progress: &ProgressSink,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        let model_path = self.model_path();
        let present = std::fs::metadata(&model_path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !present {
            return Err(TranscribeError::ModelNotDownloaded(
                self.variant.display_name().to_string(),
            ));
        }

        progress.emit(0.0, "Preparing audio");
        let pcm = convert_to_pcm16k(audio_path).await?;
        let result = self.run_model(&pcm, language, progress).await;
        let _ = std::fs::remove_file(&pcm);
        result
    }
}

fn next_estimate(estimate: f64) -> f64 {
    (estimate + PROGRESS_STEP).min(PROGRESS_CAP)
}

/// Threads for the model process, clamped to [4, min(cores, 10)].
fn thread_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_THREADS);
    cores.min(MAX_THREADS).max(MIN_THREADS)
}

fn build_args(
    model: &Path,
    audio: &Path,
    output_stem: &Path,
    threads: usize,
    variant: ModelVariant,
    language: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "-m".to_string(),
        model.to_string_lossy().into_owned(),
        "-f".to_string(),
        audio.to_string_lossy().into_owned(),
        "-oj".to_string(),
        "-of".to_string(),
        output_stem.to_string_lossy().into_owned(),
        "-t".to_string(),
        threads.to_string(),
        // Deterministic decoding; no sampling spread between runs.
        "-tp".to_string(),
        "0".to_string(),
        "-sns".to_string(),
    ];
    if variant.strict_thresholds() {
        args.extend([
            "-et".to_string(),
            "2.8".to_string(),
            "-lpt".to_string(),
            "-0.5".to_string(),
        ]);
    }
    if let Some(code) = language {
        args.push("-l".to_string());
        args.push(code.to_string());
    }
    args
}

fn parse_model_output(json: &str) -> Result<Vec<TranscriptSegment>, TranscribeError> {
    let output: ModelOutput = serde_json::from_str(json)
        .map_err(|e| TranscribeError::TranscriptionFailed(format!("unreadable model output: {}", e)))?;
    Ok(output
        .transcription
        .into_iter()
        .filter(|entry| !entry.text.trim().is_empty())
        .map(|entry| {
            TranscriptSegment::new(
                entry.text.trim(),
                entry.offsets.from_ms as f64 / 1000.0,
                1.0,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn estimate_ticks_toward_cap() {
        let mut estimate = PROGRESS_START;
        for _ in 0..100 {
            let next = next_estimate(estimate);
            assert!(next >= estimate);
            estimate = next;
        }
        assert_eq!(estimate, PROGRESS_CAP);
    }

    #[test]
    fn thread_count_is_clamped() {
        let threads = thread_count();
        assert!((MIN_THREADS..=MAX_THREADS).contains(&threads));
    }

    #[test]
    fn strict_flags_only_for_small_variants() {
        let model = Path::new("/m/ggml-tiny.bin");
        let audio = Path::new("/a/x.wav");
        let stem = Path::new("/a/x");

        let strict = build_args(model, audio, stem, 4, ModelVariant::Tiny, None);
        assert!(strict.contains(&"-et".to_string()));
        assert!(strict.contains(&"-lpt".to_string()));

        let relaxed = build_args(model, audio, stem, 4, ModelVariant::Medium, None);
        assert!(!relaxed.contains(&"-et".to_string()));
    }

    #[test]
    fn language_flag_is_omitted_for_auto_detection() {
        let model = Path::new("/m/ggml-base.bin");
        let audio = Path::new("/a/x.wav");
        let stem = Path::new("/a/x");

        let with_lang = build_args(model, audio, stem, 4, ModelVariant::Base, Some("de"));
        assert!(with_lang.ends_with(&["-l".to_string(), "de".to_string()]));

        let auto = build_args(model, audio, stem, 4, ModelVariant::Base, None);
        assert!(!auto.contains(&"-l".to_string()));
    }

    #[test]
    fn output_parses_to_segments_in_seconds() {
        let json = r#"{"transcription":[
            {"offsets":{"from_ms":0,"to_ms":1800},"text":" Hello there."},
            {"offsets":{"from_ms":1800,"to_ms":4200},"text":" Second line."},
            {"offsets":{"from_ms":4200,"to_ms":4300},"text":"  "}
        ]}"#;
        let segments = parse_model_output(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello there.");
        assert_eq!(segments[0].start_offset, 0.0);
        assert_eq!(segments[0].confidence, 1.0);
        assert_eq!(segments[1].start_offset, 1.8);
    }

    #[test]
    fn garbage_output_is_a_typed_failure() {
        assert!(matches!(
            parse_model_output("not json"),
            Err(TranscribeError::TranscriptionFailed(_))
        ));
    }

    #[tokio::test]
    async fn missing_model_fails_before_any_work() {
        let temp = TempDir::new().unwrap();
        let backend = LocalModelBackend::new(temp.path(), ModelVariant::Base);
        let result = backend
            .transcribe(Path::new("unused.m4a"), None, &ProgressSink::discard())
            .await;
        assert!(matches!(
            result,
            Err(TranscribeError::ModelNotDownloaded(name)) if name == "base"
        ));
    }

    #[cfg(unix)]
    fn fake_binary(dir: &Path, script_body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-whisper-cli");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script_body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_process_is_killed_on_timeout() {
        let temp = TempDir::new().unwrap();
        let binary = fake_binary(temp.path(), "sleep 30");
        let backend = LocalModelBackend::new(temp.path(), ModelVariant::Base)
            .with_binary_path(binary)
            .with_timeout(Duration::from_millis(200));

        let pcm = temp.path().join("audio.wav");
        std::fs::write(&pcm, b"not really audio").unwrap();

        let started = std::time::Instant::now();
        let result = backend
            .run_model(&pcm, None, &ProgressSink::discard())
            .await;
        assert!(matches!(
            result,
            Err(TranscribeError::TranscriptionTimeout(_))
        ));
        // The kill happened at the timeout, not after the child's 30 s nap.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_reads_and_removes_output_json() {
        let temp = TempDir::new().unwrap();
        // Arg 7 is the output stem (after -m, model, -f, wav, -oj, -of).
        let binary = fake_binary(
            temp.path(),
            r#"printf '{"transcription":[{"offsets":{"from_ms":500,"to_ms":2000},"text":" From the fake model."}]}' > "$7.json""#,
        );
        let backend = LocalModelBackend::new(temp.path(), ModelVariant::Base)
            .with_binary_path(binary);

        let pcm = temp.path().join("audio.wav");
        std::fs::write(&pcm, b"not really audio").unwrap();

        let segments = backend
            .run_model(&pcm, None, &ProgressSink::discard())
            .await
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "From the fake model.");
        assert_eq!(segments[0].start_offset, 0.5);
        assert!(!pcm.with_extension("json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let temp = TempDir::new().unwrap();
        let binary = fake_binary(temp.path(), "echo 'model exploded' >&2; exit 3");
        let backend = LocalModelBackend::new(temp.path(), ModelVariant::Base)
            .with_binary_path(binary);

        let pcm = temp.path().join("audio.wav");
        std::fs::write(&pcm, b"x").unwrap();

        let result = backend
            .run_model(&pcm, None, &ProgressSink::discard())
            .await;
        match result {
            Err(TranscribeError::TranscriptionFailed(detail)) => {
                assert!(detail.contains("model exploded"))
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
