mod config;
mod credentials;
mod export;
mod orchestrator;
pub mod paths;
mod records;
pub mod transcript;
pub mod transcription;

pub use config::{BackendKind, Settings};
pub use credentials::{CredentialStore, CLOUD_API_KEY};
pub use export::{export_srt, export_txt, ExportError};
pub use orchestrator::{build_backend, OrchestratorState, Phase, TranscriptionOrchestrator};
pub use records::{fingerprint, RecordStore, StoreError, TranscriptionRecord};
pub use transcript::{TranscriptEditor, TranscriptSegment};
pub use transcription::{
    DownloadStatus, ModelAssetManager, ModelVariant, ProgressSink, TranscribeError,
    TranscriptionBackend,
};

/// Set up the logger: everything to a file under the app data dir, plus
/// stdout with HTTP client noise filtered out. Call once at startup.
pub fn init_logger() -> Result<std::path::PathBuf, fern::InitError> {
    let log_file = paths::log_file_path().map_err(fern::InitError::Io)?;

    let format = |out: fern::FormatCallback<'_>, message: &std::fmt::Arguments<'_>, record: &log::Record| {
        out.finish(format_args!(
            "[{}][{}][{}][{:?}] {}",
            chrono::Local::now().format("%Y-%m-%d"),
            chrono::Local::now().format("%H:%M:%S"),
            record.target(),
            record.level(),
            message
        ))
    };

    fern::Dispatch::new()
        .format(format)
        .level(log::LevelFilter::Debug)
        .chain(
            fern::Dispatch::new()
                .filter(|m| !m.target().starts_with("hyper") && !m.target().starts_with("reqwest"))
                .chain(std::io::stdout()),
        )
        .chain(fern::log_file(&log_file)?)
        .apply()?;

    Ok(log_file)
}
