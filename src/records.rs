//! Completed-transcription records: save, list, delete.

use crate::transcript::TranscriptSegment;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("record file is unreadable: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A completed transcription, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRecord {
    pub source_path: String,
    pub segments: Vec<TranscriptSegment>,
    pub created_at: u64,
    /// Source media duration in seconds.
    pub video_duration: f64,
    /// Wall-clock seconds the transcription took.
    pub transcribe_duration: f64,
    pub fingerprint: String,
}

impl TranscriptionRecord {
    pub fn new(
        source_path: impl Into<String>,
        segments: Vec<TranscriptSegment>,
        video_duration: f64,
        transcribe_duration: f64,
    ) -> Self {
        let source_path = source_path.into();
        let fingerprint = fingerprint(&source_path, &segments, video_duration);
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            source_path,
            segments,
            created_at,
            video_duration,
            transcribe_duration,
            fingerprint,
        }
    }
}

/// Content fingerprint over source id, segment count, duration, and the
/// first/last segment text. Two records of the same transcription collide;
/// any edit to either end, or a different cut of the same video, does not.
pub fn fingerprint(source: &str, segments: &[TranscriptSegment], duration: f64) -> String {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    segments.len().hash(&mut hasher);
    duration.to_bits().hash(&mut hasher);
    if let Some(first) = segments.first() {
        first.text.hash(&mut hasher);
    }
    if let Some(last) = segments.last() {
        last.text.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

/// Minimal struct for reading the fingerprint without full deserialization.
#[derive(Deserialize)]
struct RecordMetaPartial {
    fingerprint: Option<String>,
}

/// Keyed store of records under one directory, one JSON document per
/// record, deduplicated by fingerprint.
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, record: &TranscriptionRecord) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", record.fingerprint, record.created_at))
    }

    fn contains(&self, fingerprint: &str) -> bool {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return false;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().map_or(false, |e| e == "json") {
                continue;
            }
            let found = std::fs::read_to_string(&path)
                .ok()
                .and_then(|json| serde_json::from_str::<RecordMetaPartial>(&json).ok())
                .and_then(|meta| meta.fingerprint)
                .map_or(false, |f| f == fingerprint);
            if found {
                return true;
            }
        }
        false
    }

    /// Persist a record. Returns the written path, or `None` when a record
    /// with the same fingerprint is already on disk (the save is skipped).
    pub fn save(&self, record: &TranscriptionRecord) -> Result<Option<PathBuf>, StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        if self.contains(&record.fingerprint) {
            log::debug!("[records] duplicate fingerprint {}, skipping", record.fingerprint);
            return Ok(None);
        }
        let path = self.record_path(record);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json)?;
        Ok(Some(path))
    }

    /// All saved records, newest first. Unreadable files are skipped.
    pub fn load_all(&self) -> Result<Vec<TranscriptionRecord>, StoreError> {
        let mut records = Vec::new();
        if !self.dir.exists() {
            return Ok(records);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || !path.extension().map_or(false, |e| e == "json") {
                continue;
            }
            match std::fs::read_to_string(&path)
                .ok()
                .and_then(|json| serde_json::from_str::<TranscriptionRecord>(&json).ok())
            {
                Some(record) => records.push(record),
                None => log::warn!("[records] skipping unreadable {}", path.display()),
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Remove every record with the given fingerprint. Returns how many
    /// files were deleted.
    pub fn delete(&self, fingerprint: &str) -> Result<u32, StoreError> {
        let mut deleted = 0u32;
        if !self.dir.exists() {
            return Ok(0);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.extension().map_or(false, |e| e == "json") {
                continue;
            }
            let matches = std::fs::read_to_string(&path)
                .ok()
                .and_then(|json| serde_json::from_str::<RecordMetaPartial>(&json).ok())
                .and_then(|meta| meta.fingerprint)
                .map_or(false, |f| f == fingerprint);
            if matches {
                std::fs::remove_file(&path)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
