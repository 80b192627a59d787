//! Pluggable transcription backends.

mod audio_extract;
mod backend;
mod cloud;
mod local_model;
mod model_download;
mod on_device;
#[cfg(feature = "recognizer-vosk")]
mod vosk_recognizer;

pub use audio_extract::{convert_to_pcm16k, count_audio_streams, extract_audio, probe_duration};
pub use backend::{ProgressSink, TranscribeError, TranscriptionBackend};
pub use cloud::{CloudApi, CloudBackend, CloudWord, HttpCloudApi, JobStatus};
pub use local_model::LocalModelBackend;
pub use model_download::{
    DownloadError, DownloadPhase, DownloadSnapshot, DownloadStatus, ModelAssetManager,
    ModelVariant,
};
pub use on_device::{
    calculate_chunks, ChunkSpan, OnDeviceBackend, SpeechRecognizer, WindowResult, WINDOW_SECONDS,
};
#[cfg(feature = "recognizer-vosk")]
pub use vosk_recognizer::VoskRecognizer;
