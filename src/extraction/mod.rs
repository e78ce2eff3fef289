use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod apify;

use crate::error::PipelineError;
use crate::utils::{PollOutcome, Poller};

pub use apify::ApifyService;

/// Lifecycle of an extraction job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a submitted extraction job
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    /// Link the job was submitted for
    pub source_url: String,

    pub job_id: String,

    pub status: JobStatus,

    /// Where the job's result records live once it succeeded
    pub dataset_id: Option<String>,

    /// Raw job payload from the service, kept for diagnostics
    pub payload: serde_json::Value,
}

/// Job submission settings
#[derive(Debug, Clone, Serialize)]
pub struct JobRequest {
    pub source_url: String,
    pub use_proxy: bool,
}

/// Remote actor/worker service that runs extraction jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Start a job and return its initial state
    async fn submit(&self, request: &JobRequest) -> anyhow::Result<ExtractionJob>;

    /// Fetch the current state of a job
    async fn poll(&self, job: &ExtractionJob) -> anyhow::Result<ExtractionJob>;

    /// Fetch the result records of a finished job, in order
    async fn fetch_results(&self, dataset_id: &str) -> anyhow::Result<Vec<serde_json::Value>>;
}

/// Submits extraction jobs and waits for their media URL
#[derive(Clone)]
pub struct JobClient {
    service: Arc<dyn ExtractionService>,
    poller: Poller,
    use_proxy: bool,
    result_field: String,
}

impl JobClient {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        poller: Poller,
        use_proxy: bool,
        result_field: impl Into<String>,
    ) -> Self {
        Self {
            service,
            poller,
            use_proxy,
            result_field: result_field.into(),
        }
    }

    /// Submit a job for `source_url`, wait for it to finish and return the media URL
    pub async fn submit_and_await(&self, source_url: &str) -> Result<String, PipelineError> {
        let request = JobRequest {
            source_url: source_url.to_string(),
            use_proxy: self.use_proxy,
        };

        let submitted = self
            .service
            .submit(&request)
            .await
            .map_err(|e| PipelineError::ExtractionFailed {
                detail: format!("Failed to submit extraction job: {:#}", e),
            })?;
        tracing::info!("Extraction job started: {}", submitted.job_id);

        let outcome = self
            .poller
            .poll_until(
                |attempt| {
                    let submitted = &submitted;
                    async move {
                        let job = self.service.poll(submitted).await?;
                        tracing::debug!(
                            "Extraction job {} status: {} (poll #{})",
                            job.job_id,
                            job.status,
                            attempt
                        );
                        Ok::<_, anyhow::Error>(job)
                    }
                },
                |job| job.status.is_terminal(),
            )
            .await
            .map_err(|e| PipelineError::ExtractionFailed {
                detail: format!("Failed to poll extraction job: {:#}", e),
            })?;

        let job = match outcome {
            PollOutcome::Ready { value, .. } => value,
            PollOutcome::Exhausted { last, attempts } => {
                return Err(PipelineError::ExtractionTimeout {
                    attempts,
                    last_status: last.status.to_string(),
                });
            }
        };

        if job.status == JobStatus::Failed {
            let detail = serde_json::to_string_pretty(&job.payload)
                .unwrap_or_else(|_| job.payload.to_string());
            return Err(PipelineError::ExtractionFailed { detail });
        }

        let dataset_id = job
            .dataset_id
            .as_deref()
            .ok_or_else(|| PipelineError::ExtractionFailed {
                detail: format!("Job {} succeeded without a result dataset", job.job_id),
            })?;

        let items = self
            .service
            .fetch_results(dataset_id)
            .await
            .map_err(|e| PipelineError::ExtractionFailed {
                detail: format!("Failed to fetch extraction results: {:#}", e),
            })?;

        // Only the first item is used when several come back
        let first = items.first().ok_or(PipelineError::EmptyResult)?;
        let media_url = first
            .get(&self.result_field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PipelineError::MissingResultField {
                field: self.result_field.clone(),
            })?;

        tracing::info!("Video URL from dataset: {}", media_url);
        Ok(media_url.to_string())
    }
}
