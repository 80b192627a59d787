//! Path utilities for app data, records, and models directories.

use std::io;
use std::path::PathBuf;

/// Get the app data directory (e.g. ~/.local/share/vid-scribe on Linux).
pub fn app_data_dir() -> io::Result<PathBuf> {
    let dir = dirs::data_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no data directory"))?
        .join("vid-scribe");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the records directory, creating it if necessary.
pub fn records_dir() -> io::Result<PathBuf> {
    let dir = app_data_dir()?.join("records");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the models directory, creating it if necessary.
pub fn models_dir() -> io::Result<PathBuf> {
    let dir = app_data_dir()?.join("models");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the path to the settings file.
pub fn settings_path() -> io::Result<PathBuf> {
    Ok(app_data_dir()?.join("settings.json"))
}

/// Get the path to the credentials file.
pub fn credentials_path() -> io::Result<PathBuf> {
    Ok(app_data_dir()?.join("credentials.json"))
}

/// Get the log file path (e.g. ~/.local/share/vid-scribe/logs/vid-scribe.log).
pub fn log_file_path() -> io::Result<PathBuf> {
    let dir = app_data_dir()?.join("logs");
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("vid-scribe.log"))
}

/// Ensure all app directories exist.
pub fn ensure_directories() -> io::Result<()> {
    app_data_dir()?;
    records_dir()?;
    models_dir()?;
    let _ = log_file_path();
    Ok(())
}
