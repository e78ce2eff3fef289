use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::error::PipelineError;
use crate::utils::{file_size, format_file_size};

/// Runs the external conversion from a video file to an audio-only file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    async fn encode(&self, video_path: &Path, audio_path: &Path) -> anyhow::Result<()>;
}

/// ffmpeg-backed encoder: drops the video stream, encodes audio with `codec`
pub struct FfmpegEncoder {
    ffmpeg_path: String,
    codec: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<String>, codec: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            codec: codec.into(),
        }
    }
}

#[async_trait]
impl AudioEncoder for FfmpegEncoder {
    async fn encode(&self, video_path: &Path, audio_path: &Path) -> anyhow::Result<()> {
        tracing::debug!("Converting {} to audio with {}", video_path.display(), self.codec);

        let output = Command::new(&self.ffmpeg_path)
            .args([
                "-hide_banner",
                "-nostdin",
                "-i", &video_path.to_string_lossy(),
                "-vn", // No video
                "-acodec", &self.codec,
                "-y", // Overwrite output file
                &audio_path.to_string_lossy(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg exited with {}: {}", output.status, error.trim());
        }

        Ok(())
    }
}

/// Audio extraction with output size policy
#[derive(Clone)]
pub struct Transcoder {
    encoder: Arc<dyn AudioEncoder>,
}

impl Transcoder {
    pub fn new(encoder: Arc<dyn AudioEncoder>) -> Self {
        Self { encoder }
    }

    /// Convert `video_path` into `audio_path`, rejecting empty output and output above `max_bytes`
    pub async fn extract_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        max_bytes: u64,
    ) -> Result<u64, PipelineError> {
        self.encoder
            .encode(video_path, audio_path)
            .await
            .map_err(|e| PipelineError::Transcode(format!("{:#}", e)))?;

        let size = file_size(audio_path).await?;
        if size == 0 {
            return Err(PipelineError::TranscodeEmpty);
        }
        tracing::info!("Audio file created, size: {}", format_file_size(size));

        if size > max_bytes {
            return Err(PipelineError::TranscodeTooLarge { size, limit: max_bytes });
        }

        Ok(size)
    }
}
