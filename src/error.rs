use serde::Serialize;
use std::fmt;

/// Machine-checkable failure kind reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ValidationError,
    ExtractionFailed,
    ExtractionTimeout,
    EmptyResult,
    MissingResultField,
    DownloadEmpty,
    DownloadTimeout,
    DownloadTransportError,
    TranscodeEmpty,
    TranscodeTooLarge,
    TranscodeError,
    StagingError,
    StagedEmpty,
    UploadFailed,
    CleanupError,
    IoError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ExtractionFailed => "ExtractionFailed",
            ErrorKind::ExtractionTimeout => "ExtractionTimeout",
            ErrorKind::EmptyResult => "EmptyResult",
            ErrorKind::MissingResultField => "MissingResultField",
            ErrorKind::DownloadEmpty => "DownloadEmpty",
            ErrorKind::DownloadTimeout => "DownloadTimeout",
            ErrorKind::DownloadTransportError => "DownloadTransportError",
            ErrorKind::TranscodeEmpty => "TranscodeEmpty",
            ErrorKind::TranscodeTooLarge => "TranscodeTooLarge",
            ErrorKind::TranscodeError => "TranscodeError",
            ErrorKind::StagingError => "StagingError",
            ErrorKind::StagedEmpty => "StagedEmpty",
            ErrorKind::UploadFailed => "UploadFailed",
            ErrorKind::CleanupError => "CleanupError",
            ErrorKind::IoError => "IoError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by a pipeline run
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Extraction job failed: {detail}")]
    ExtractionFailed { detail: String },

    #[error("Extraction job did not finish after {attempts} polls (last status: {last_status})")]
    ExtractionTimeout { attempts: u32, last_status: String },

    #[error("No results found in extraction dataset")]
    EmptyResult,

    #[error("Field '{field}' not found in extraction result item")]
    MissingResultField { field: String },

    #[error("Downloaded video file is empty")]
    DownloadEmpty,

    #[error("Video download timed out: {0}")]
    DownloadTimeout(String),

    #[error("Video download failed: {0}")]
    DownloadTransport(String),

    #[error("Converted audio file is empty")]
    TranscodeEmpty,

    #[error("Audio file size ({size} bytes) exceeds {limit} byte limit")]
    TranscodeTooLarge { size: u64, limit: u64 },

    #[error("Audio conversion failed: {0}")]
    Transcode(String),

    #[error("Staging store operation failed: {0}")]
    Staging(String),

    #[error("Audio retrieved from staging store is empty")]
    StagedEmpty,

    #[error("Upload failed after {attempts} attempt(s): {message}")]
    UploadFailed {
        attempts: u32,
        status: Option<u16>,
        body: Option<String>,
        message: String,
    },

    #[error("Cleanup of {target} failed: {message}")]
    Cleanup { target: String, message: String },

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::ValidationError,
            PipelineError::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            PipelineError::ExtractionTimeout { .. } => ErrorKind::ExtractionTimeout,
            PipelineError::EmptyResult => ErrorKind::EmptyResult,
            PipelineError::MissingResultField { .. } => ErrorKind::MissingResultField,
            PipelineError::DownloadEmpty => ErrorKind::DownloadEmpty,
            PipelineError::DownloadTimeout(_) => ErrorKind::DownloadTimeout,
            PipelineError::DownloadTransport(_) => ErrorKind::DownloadTransportError,
            PipelineError::TranscodeEmpty => ErrorKind::TranscodeEmpty,
            PipelineError::TranscodeTooLarge { .. } => ErrorKind::TranscodeTooLarge,
            PipelineError::Transcode(_) => ErrorKind::TranscodeError,
            PipelineError::Staging(_) => ErrorKind::StagingError,
            PipelineError::StagedEmpty => ErrorKind::StagedEmpty,
            PipelineError::UploadFailed { .. } => ErrorKind::UploadFailed,
            PipelineError::Cleanup { .. } => ErrorKind::CleanupError,
            PipelineError::Io(_) => ErrorKind::IoError,
        }
    }

    /// Validation failures are the caller's fault; everything else is ours
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_variants() {
        let err = PipelineError::TranscodeTooLarge {
            size: 6 * 1024 * 1024,
            limit: 5 * 1024 * 1024,
        };
        assert_eq!(err.kind(), ErrorKind::TranscodeTooLarge);
        assert_eq!(err.kind().to_string(), "TranscodeTooLarge");
        assert_eq!(
            PipelineError::DownloadTransport("reset".into()).kind().as_str(),
            "DownloadTransportError"
        );
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::ExtractionTimeout).unwrap();
        assert_eq!(json, "\"ExtractionTimeout\"");
    }

    #[test]
    fn test_only_validation_is_client_error() {
        assert!(PipelineError::validation("missing").is_client_error());
        assert!(!PipelineError::EmptyResult.is_client_error());
    }

    #[test]
    fn test_upload_failed_message_keeps_detail() {
        let err = PipelineError::UploadFailed {
            attempts: 3,
            status: Some(502),
            body: Some("bad gateway".into()),
            message: "HTTP 502: bad gateway".into(),
        };
        assert_eq!(err.to_string(), "Upload failed after 3 attempt(s): HTTP 502: bad gateway");
    }
}
