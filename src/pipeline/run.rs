use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::staging::{StagedObject, StagingClient};

/// Pipeline state machine; runs only ever move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Started,
    Extracting,
    Downloading,
    Transcoding,
    StagingUpload,
    StagingVerify,
    Uploading,
    Cleanup,
    Succeeded,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Started => "STARTED",
            Stage::Extracting => "EXTRACTING",
            Stage::Downloading => "DOWNLOADING",
            Stage::Transcoding => "TRANSCODING",
            Stage::StagingUpload => "STAGING_UPLOAD",
            Stage::StagingVerify => "STAGING_VERIFY",
            Stage::Uploading => "UPLOADING",
            Stage::Cleanup => "CLEANUP",
            Stage::Succeeded => "SUCCEEDED",
            Stage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    Video,
    AudioRaw,
    AudioStaged,
}

impl ArtifactKind {
    /// File name of this artifact within a run: `<run_id>-<suffix>.<ext>`
    pub fn file_name(&self, run_id: &str, audio_extension: &str) -> String {
        match self {
            ArtifactKind::Video => format!("{}-video.mp4", run_id),
            ArtifactKind::AudioRaw => format!("{}-audio.{}", run_id, audio_extension),
            ArtifactKind::AudioStaged => format!("{}-staged.{}", run_id, audio_extension),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video",
            ArtifactKind::AudioRaw => "audio",
            ArtifactKind::AudioStaged => "staged audio",
        }
    }
}

/// Local file owned by one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientArtifact {
    pub local_path: PathBuf,
    pub kind: ArtifactKind,
    pub size_bytes: u64,
}

/// State of one request's trip through the pipeline.
///
/// Every artifact and staged object is registered here *before* the stage
/// that creates it runs, so cleanup also covers partially written files.
#[derive(Debug)]
pub struct PipelineRun {
    pub run_id: String,
    pub input_url: String,
    stage: Stage,
    artifacts: Vec<TransientArtifact>,
    staged_object: Option<StagedObject>,
}

impl PipelineRun {
    pub fn new(input_url: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            input_url: input_url.into(),
            stage: Stage::Started,
            artifacts: Vec::new(),
            staged_object: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn artifacts(&self) -> &[TransientArtifact] {
        &self.artifacts
    }

    pub fn staged_object(&self) -> Option<&StagedObject> {
        self.staged_object.as_ref()
    }

    pub fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "stage cannot move from {} to {}", self.stage, next);
        tracing::info!("Run {}: {} -> {}", self.run_id, self.stage, next);
        self.stage = next;
    }

    /// Register a local artifact and return its path
    pub fn register_artifact(&mut self, kind: ArtifactKind, local_path: PathBuf) -> PathBuf {
        self.artifacts.push(TransientArtifact {
            local_path: local_path.clone(),
            kind,
            size_bytes: 0,
        });
        local_path
    }

    pub fn record_size(&mut self, kind: ArtifactKind, size_bytes: u64) {
        if let Some(artifact) = self.artifacts.iter_mut().find(|a| a.kind == kind) {
            artifact.size_bytes = size_bytes;
        }
    }

    /// Register the remote key before uploading to it
    pub fn register_staged_key(&mut self, remote_key: impl Into<String>) {
        self.staged_object = Some(StagedObject {
            remote_key: remote_key.into(),
            exists: false,
        });
    }

    pub fn mark_staged(&mut self, staged: StagedObject) {
        self.staged_object = Some(staged);
    }

    /// Remove every registered artifact and purge the staged object.
    ///
    /// Each step runs regardless of earlier failures; failures are returned.
    /// Calling this again is a no-op.
    pub async fn cleanup(&mut self, staging: &StagingClient) -> Vec<PipelineError> {
        let mut errors = Vec::new();

        for artifact in self.artifacts.drain(..) {
            if let Err(e) = remove_if_present(&artifact.local_path).await {
                errors.push(PipelineError::Cleanup {
                    target: artifact.local_path.display().to_string(),
                    message: e.to_string(),
                });
            } else {
                tracing::debug!(
                    "Temporary {} file removed: {}",
                    artifact.kind.label(),
                    artifact.local_path.display()
                );
            }
        }

        if let Some(staged) = self.staged_object.take() {
            if let Err(e) = staging.purge(&staged.remote_key).await {
                errors.push(e);
            }
        }

        for error in &errors {
            tracing::warn!("Run {}: {}", self.run_id, error);
        }
        errors
    }
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
