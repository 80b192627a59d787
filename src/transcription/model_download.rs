//! Download and manage local speech model assets.

use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Local model variants, smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelVariant {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV3,
}

impl ModelVariant {
    pub fn all() -> [ModelVariant; 5] {
        [
            ModelVariant::Tiny,
            ModelVariant::Base,
            ModelVariant::Small,
            ModelVariant::Medium,
            ModelVariant::LargeV3,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelVariant::Tiny => "tiny",
            ModelVariant::Base => "base",
            ModelVariant::Small => "small",
            ModelVariant::Medium => "medium",
            ModelVariant::LargeV3 => "large-v3",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ModelVariant::Tiny => "ggml-tiny.bin",
            ModelVariant::Base => "ggml-base.bin",
            ModelVariant::Small => "ggml-small.bin",
            ModelVariant::Medium => "ggml-medium.bin",
            ModelVariant::LargeV3 => "ggml-large-v3.bin",
        }
    }

    pub fn url(&self) -> String {
        format!("{}/{}", MODEL_BASE_URL, self.file_name())
    }

    pub fn approx_bytes(&self) -> u64 {
        match self {
            ModelVariant::Tiny => 77_691_713,
            ModelVariant::Base => 147_951_465,
            ModelVariant::Small => 487_601_967,
            ModelVariant::Medium => 1_533_774_781,
            ModelVariant::LargeV3 => 3_094_623_691,
        }
    }

    /// The two smallest variants decode with stricter quality thresholds;
    /// larger ones are prone to hang under them.
    pub fn strict_thresholds(&self) -> bool {
        matches!(self, ModelVariant::Tiny | ModelVariant::Base)
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid download URL: {0}")]
    InvalidUrl(String),
    #[error("download failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Downloading,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DownloadSnapshot {
    pub phase: DownloadPhase,
    pub fraction: f64,
    pub message: String,
}

/// Shared download state, observable by surfaces that did not initiate the
/// download. Pass it by reference to whoever needs to react; there is no
/// hidden global.
pub struct DownloadStatus {
    state: Mutex<DownloadSnapshot>,
}

impl DownloadStatus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DownloadSnapshot {
                phase: DownloadPhase::Idle,
                fraction: 0.0,
                message: String::new(),
            }),
        }
    }

    fn begin(&self, what: &str) {
        let mut s = self.state.lock().unwrap();
        s.phase = DownloadPhase::Downloading;
        s.fraction = 0.0;
        s.message = format!("Downloading {}", what);
    }

    fn set_progress(&self, fraction: f64) {
        let mut s = self.state.lock().unwrap();
        s.fraction = fraction.clamp(0.0, 1.0);
    }

    fn finish(&self, what: &str) {
        let mut s = self.state.lock().unwrap();
        s.phase = DownloadPhase::Completed;
        s.fraction = 1.0;
        s.message = format!("{} ready", what);
    }

    fn fail(&self, message: &str) {
        let mut s = self.state.lock().unwrap();
        s.phase = DownloadPhase::Failed;
        s.message = message.to_string();
    }

    pub fn reset(&self) {
        let mut s = self.state.lock().unwrap();
        s.phase = DownloadPhase::Idle;
        s.fraction = 0.0;
        s.message.clear();
    }

    pub fn snapshot(&self) -> DownloadSnapshot {
        self.state.lock().unwrap().clone()
    }
}

impl Default for DownloadStatus {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_url(url: &str) -> Result<reqwest::Url, DownloadError> {
    reqwest::Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))
}

/// Owns the on-disk model directory.
pub struct ModelAssetManager {
    models_dir: PathBuf,
}

impl ModelAssetManager {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn path_for(&self, variant: ModelVariant) -> PathBuf {
        self.models_dir.join(variant.file_name())
    }

    /// Present means the file exists with non-zero size; no deeper
    /// integrity check is performed.
    pub fn is_present(&self, variant: ModelVariant) -> bool {
        std::fs::metadata(self.path_for(variant))
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    pub fn installed(&self) -> Vec<ModelVariant> {
        ModelVariant::all()
            .into_iter()
            .filter(|v| self.is_present(*v))
            .collect()
    }

    /// Download a model, streaming progress as (bytes_downloaded,
    /// total_bytes). An already-present file is success with no network
    /// I/O. Failures surface through the return value and on `status` so
    /// other observers of the shared state are informed too.
    pub async fn download<F>(
        &self,
        variant: ModelVariant,
        status: &DownloadStatus,
        mut on_progress: F,
    ) -> Result<PathBuf, DownloadError>
    where
        F: FnMut(u64, Option<u64>) + Send,
    {
        let dest = self.path_for(variant);
        if self.is_present(variant) {
            debug!("[models] {} already present", variant.display_name());
            status.finish(variant.display_name());
            return Ok(dest);
        }

        std::fs::create_dir_all(&self.models_dir)?;
        let url = parse_url(&variant.url())?;
        status.begin(variant.display_name());
        info!("[models] downloading {} from {}", variant.display_name(), url);

        let response = match reqwest::get(url).await {
            Ok(r) => r,
            Err(e) => {
                status.fail(&e.to_string());
                return Err(DownloadError::Failed(e.to_string()));
            }
        };
        if !response.status().is_success() {
            let message = format!("HTTP {}", response.status());
            status.fail(&message);
            return Err(DownloadError::Failed(message));
        }

        let total_bytes = response.content_length();
        let part = dest.with_extension("part");
        let mut file = std::fs::File::create(&part)?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    status.fail(&e.to_string());
                    let _ = std::fs::remove_file(&part);
                    return Err(DownloadError::Failed(e.to_string()));
                }
            };
            file.write_all(&bytes)?;
            downloaded += bytes.len() as u64;
            if let Some(total) = total_bytes {
                status.set_progress(downloaded as f64 / total as f64);
            }
            on_progress(downloaded, total_bytes);
        }
        file.flush()?;
        drop(file);

        // The partial file is only valid right now; move it into place
        // before anything else runs. Any stale file at the destination is
        // replaced.
        if dest.exists() {
            let _ = std::fs::remove_file(&dest);
        }
        std::fs::rename(&part, &dest)?;

        status.finish(variant.display_name());
        info!(
            "[models] {} downloaded ({} bytes)",
            variant.display_name(),
            downloaded
        );
        Ok(dest)
    }

    /// Idempotent: deleting an absent model is a no-op.
    pub fn delete(&self, variant: ModelVariant) -> std::io::Result<()> {
        let path = self.path_for(variant);
        if path.exists() {
            std::fs::remove_file(&path)?;
            info!("[models] deleted {}", variant.display_name());
        } else {
            warn!("[models] delete requested for absent {}", variant.display_name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn variant_urls_are_well_formed() {
        for variant in ModelVariant::all() {
            let url = variant.url();
            assert!(parse_url(&url).is_ok(), "bad url {}", url);
            assert!(url.ends_with(variant.file_name()));
        }
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            parse_url("not a url"),
            Err(DownloadError::InvalidUrl(_))
        ));
    }

    #[test]
    fn strict_thresholds_only_for_smallest_variants() {
        assert!(ModelVariant::Tiny.strict_thresholds());
        assert!(ModelVariant::Base.strict_thresholds());
        assert!(!ModelVariant::Small.strict_thresholds());
        assert!(!ModelVariant::Medium.strict_thresholds());
        assert!(!ModelVariant::LargeV3.strict_thresholds());
    }

    #[test]
    fn zero_byte_file_is_not_present() {
        let temp = TempDir::new().unwrap();
        let manager = ModelAssetManager::new(temp.path());
        std::fs::write(manager.path_for(ModelVariant::Tiny), b"").unwrap();
        assert!(!manager.is_present(ModelVariant::Tiny));
    }

    #[tokio::test]
    async fn present_model_downloads_without_network() {
        let temp = TempDir::new().unwrap();
        let manager = ModelAssetManager::new(temp.path());
        std::fs::write(manager.path_for(ModelVariant::Tiny), b"model bytes").unwrap();

        let status = DownloadStatus::new();
        let mut calls = 0u32;
        // Succeeds offline: the presence check short-circuits any request.
        let path = manager
            .download(ModelVariant::Tiny, &status, |_, _| calls += 1)
            .await
            .unwrap();

        assert_eq!(path, manager.path_for(ModelVariant::Tiny));
        assert_eq!(calls, 0);
        assert_eq!(status.snapshot().phase, DownloadPhase::Completed);
    }

    #[test]
    fn delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let manager = ModelAssetManager::new(temp.path());
        std::fs::write(manager.path_for(ModelVariant::Base), b"x").unwrap();

        manager.delete(ModelVariant::Base).unwrap();
        assert!(!manager.is_present(ModelVariant::Base));
        // Absent now; a second delete is still Ok.
        manager.delete(ModelVariant::Base).unwrap();
    }

    #[test]
    fn installed_lists_only_present_variants() {
        let temp = TempDir::new().unwrap();
        let manager = ModelAssetManager::new(temp.path());
        std::fs::write(manager.path_for(ModelVariant::Small), b"x").unwrap();
        assert_eq!(manager.installed(), vec![ModelVariant::Small]);
    }

    #[test]
    fn status_lifecycle() {
        let status = DownloadStatus::new();
        assert_eq!(status.snapshot().phase, DownloadPhase::Idle);

        status.begin("tiny");
        assert_eq!(status.snapshot().phase, DownloadPhase::Downloading);
        status.set_progress(0.4);
        assert!((status.snapshot().fraction - 0.4).abs() < 1e-9);

        status.fail("boom");
        assert_eq!(status.snapshot().phase, DownloadPhase::Failed);
        assert_eq!(status.snapshot().message, "boom");

        status.reset();
        assert_eq!(status.snapshot().phase, DownloadPhase::Idle);
        assert_eq!(status.snapshot().fraction, 0.0);
    }
}
