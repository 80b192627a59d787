//! On-disk settings.

use crate::records::StoreError;
use crate::transcription::ModelVariant;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which transcription provider the orchestrator should drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    OnDevice,
    Cloud,
    LocalModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub backend: BackendKind,
    /// ISO 639-1 hint; `None` requests auto-detection.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_model_variant")]
    pub model_variant: ModelVariant,
    /// Cloud provider endpoint, e.g. "https://api.provider.example/v2".
    #[serde(default)]
    pub cloud_base_url: String,
    #[serde(default = "default_subtitle_line_width")]
    pub subtitle_line_width: usize,
}

fn default_model_variant() -> ModelVariant {
    ModelVariant::Base
}

fn default_subtitle_line_width() -> usize {
    42
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::OnDevice,
            language: None,
            model_variant: default_model_variant(),
            cloud_base_url: String::new(),
            subtitle_line_width: default_subtitle_line_width(),
        }
    }
}

impl Settings {
    /// Load settings; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load(&temp.path().join("settings.json")).unwrap();
        assert_eq!(settings.backend, BackendKind::OnDevice);
        assert_eq!(settings.model_variant, ModelVariant::Base);
        assert_eq!(settings.subtitle_line_width, 42);
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");

        let settings = Settings {
            backend: BackendKind::LocalModel,
            language: Some("de".into()),
            model_variant: ModelVariant::Small,
            cloud_base_url: "https://api.provider.example/v2".into(),
            subtitle_line_width: 60,
        };
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.backend, BackendKind::LocalModel);
        assert_eq!(loaded.language.as_deref(), Some("de"));
        assert_eq!(loaded.model_variant, ModelVariant::Small);
        assert_eq!(loaded.subtitle_line_width, 60);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, r#"{"backend":"cloud"}"#).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.backend, BackendKind::Cloud);
        assert_eq!(loaded.language, None);
    }
}
