//! Pull the audio track out of a video container with ffmpeg.
//!
//! Extraction produces a general-purpose AAC intermediate; backends that
//! need a specific sample format (16 kHz mono PCM) run their own secondary
//! conversion via [`convert_to_pcm16k`]. The caller owns the returned temp
//! files and is responsible for deleting them.

use super::backend::TranscribeError;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::process::Command;

fn ffmpeg_path() -> Result<PathBuf, TranscribeError> {
    which::which("ffmpeg")
        .map_err(|_| TranscribeError::ExtractionFailed("ffmpeg not found on PATH".into()))
}

fn ffprobe_path() -> Result<PathBuf, TranscribeError> {
    which::which("ffprobe")
        .map_err(|_| TranscribeError::ExtractionFailed("ffprobe not found on PATH".into()))
}

fn temp_file(prefix: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{}_{}.{}",
        prefix,
        uuid::Uuid::new_v4(),
        extension
    ))
}

async fn run_ffprobe(args: &[&str]) -> Result<serde_json::Value, TranscribeError> {
    let output = Command::new(ffprobe_path()?)
        .args(args)
        .output()
        .await
        .map_err(|e| TranscribeError::ExtractionFailed(format!("failed to run ffprobe: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TranscribeError::ExtractionFailed(format!(
            "ffprobe failed: {}",
            stderr.trim()
        )));
    }
    serde_json::from_slice(&output.stdout)
        .map_err(|e| TranscribeError::ExtractionFailed(format!("unreadable ffprobe output: {}", e)))
}

/// Number of audio-capable streams in the container.
pub async fn count_audio_streams(media: &Path) -> Result<usize, TranscribeError> {
    let json = run_ffprobe(&[
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_streams",
        "-select_streams",
        "a",
        &media.to_string_lossy(),
    ])
    .await?;
    Ok(json
        .get("streams")
        .and_then(|s| s.as_array())
        .map(|s| s.len())
        .unwrap_or(0))
}

/// Media duration in seconds, from container metadata.
pub async fn probe_duration(media: &Path) -> Result<f64, TranscribeError> {
    let json = run_ffprobe(&[
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        &media.to_string_lossy(),
    ])
    .await?;
    json.get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| TranscribeError::ExtractionFailed("container reports no duration".into()))
}

/// Demux/transcode the video's audio into a uniquely named temporary AAC
/// file. Confirms an audio stream exists first; a video without one fails
/// with [`TranscribeError::NoAudioTrack`].
pub async fn extract_audio(video: &Path) -> Result<PathBuf, TranscribeError> {
    if count_audio_streams(video).await? == 0 {
        return Err(TranscribeError::NoAudioTrack);
    }

    let out = temp_file("vid-scribe_audio", "m4a");
    debug!(
        "[extract] {} -> {}",
        video.display(),
        out.display()
    );
    let output = Command::new(ffmpeg_path()?)
        .args([
            "-y",
            "-v",
            "error",
            "-i",
            &video.to_string_lossy(),
            "-vn",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            &out.to_string_lossy(),
        ])
        .output()
        .await
        .map_err(|e| TranscribeError::ExtractionFailed(format!("failed to run ffmpeg: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let _ = std::fs::remove_file(&out);
        return Err(TranscribeError::ExtractionFailed(stderr.trim().to_string()));
    }
    Ok(out)
}

/// Secondary conversion to the fixed sample format the local model and the
/// on-device recognizer consume: mono, 16 kHz, 16-bit PCM WAV.
pub async fn convert_to_pcm16k(audio: &Path) -> Result<PathBuf, TranscribeError> {
    let out = temp_file("vid-scribe_pcm", "wav");
    let output = Command::new(ffmpeg_path()?)
        .args([
            "-y",
            "-v",
            "error",
            "-i",
            &audio.to_string_lossy(),
            "-ar",
            "16000",
            "-ac",
            "1",
            "-c:a",
            "pcm_s16le",
            &out.to_string_lossy(),
        ])
        .output()
        .await
        .map_err(|e| TranscribeError::ExtractionFailed(format!("failed to run ffmpeg: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let _ = std::fs::remove_file(&out);
        return Err(TranscribeError::ExtractionFailed(stderr.trim().to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_files_do_not_collide() {
        let a = temp_file("vid-scribe_audio", "m4a");
        let b = temp_file("vid-scribe_audio", "m4a");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".m4a"));
    }
}
