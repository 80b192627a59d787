//! API-key storage for the cloud backend.

use crate::records::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Key under which the cloud provider API key is stored.
pub const CLOUD_API_KEY: &str = "cloud-api-key";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    entries: HashMap<String, String>,
}

/// Opaque get/set of secret strings, one JSON document on disk.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<CredentialFile, StoreError> {
        if !self.path.exists() {
            return Ok(CredentialFile::default());
        }
        let json = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write(&self, file: &CredentialFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(file)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.entries.get(key).cloned())
    }

    /// Store a secret. An empty value deletes the entry instead.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut file = self.read()?;
        if value.is_empty() {
            file.entries.remove(key);
        } else {
            file.entries.insert(key.to_string(), value.to_string());
        }
        self.write(&file)
    }
}
