use std::path::Path;
use url::Url;

use crate::error::PipelineError;

pub mod poll;

pub use poll::{PollOutcome, Poller, RetriesExhausted};

/// Validate a URL and return it trimmed
pub fn validate_and_normalize_url(url: &str) -> Result<String, PipelineError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::validation("Missing reelUrl in request body"));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|_| PipelineError::validation(format!("Invalid URL format: {}", trimmed)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PipelineError::validation("URL must use HTTP or HTTPS protocol"));
    }

    // Only surrounding whitespace is stripped; the link goes out as given
    Ok(trimmed.to_string())
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{:.1}s", seconds);
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        format!("{}m {}s", minutes, secs)
    }
}

/// Build a staging key unique to one run: `<prefix><run_id>-<millis>.<ext>`
pub fn generate_staging_key(prefix: &str, run_id: &str, extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{}{}-{}.{}", prefix, run_id, millis, extension)
}

/// MIME type for an audio file extension
pub fn audio_mime_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "aac" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Size of a local file, zero when it does not exist
pub async fn file_size(path: &Path) -> std::io::Result<u64> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// Mask a secret for display, keeping the last four characters
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let visible: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if visible.len() == secret.len() {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}

/// Check if the current environment has the transcoding tool and codec
pub async fn check_dependencies(ffmpeg_path: &str, codec: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(ffmpeg_path).await {
        missing.push(format!("{} - required for audio extraction", ffmpeg_path));
        return missing;
    }

    if !check_encoder_available(ffmpeg_path, codec).await {
        missing.push(format!("{} encoder - not listed by {}", codec, ffmpeg_path));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

async fn check_encoder_available(ffmpeg_path: &str, codec: &str) -> bool {
    use tokio::process::Command;

    match Command::new(ffmpeg_path)
        .args(["-hide_banner", "-encoders"])
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout)
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(codec))
        }
        _ => false,
    }
}
