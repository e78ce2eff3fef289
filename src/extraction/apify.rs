use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ExtractionJob, ExtractionService, JobRequest, JobStatus};

/// Extraction backend talking to the Apify actor API (v2)
pub struct ApifyService {
    client: Client,
    base_url: String,
    token: String,
    actor_id: String,
}

/// Envelope every Apify object endpoint wraps its payload in
#[derive(Debug, Deserialize)]
struct Envelope {
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunInfo {
    id: String,
    status: String,
    default_dataset_id: Option<String>,
}

impl ApifyService {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            actor_id: actor_id.into(),
        }
    }

    /// Map an Apify run status onto the job lifecycle
    fn map_status(status: &str) -> JobStatus {
        match status {
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" | "TIMED-OUT" | "ABORTED" => JobStatus::Failed,
            "READY" => JobStatus::Pending,
            _ => JobStatus::Running,
        }
    }

    fn to_job(source_url: &str, payload: Value) -> Result<ExtractionJob> {
        let run: RunInfo = serde_json::from_value(payload.clone())
            .context("Unexpected actor run payload")?;

        Ok(ExtractionJob {
            source_url: source_url.to_string(),
            job_id: run.id,
            status: Self::map_status(&run.status),
            dataset_id: run.default_dataset_id,
            payload,
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, body);
        }
        response.json::<T>().await.context("Failed to decode response body")
    }
}

#[async_trait]
impl ExtractionService for ApifyService {
    async fn submit(&self, request: &JobRequest) -> Result<ExtractionJob> {
        let input = json!({
            "reelLinks": [request.source_url],
            "proxyConfiguration": { "useApifyProxy": request.use_proxy },
        });

        let response = self
            .client
            .post(format!("{}/acts/{}/runs", self.base_url, self.actor_id))
            .bearer_auth(&self.token)
            .json(&input)
            .send()
            .await
            .context("Failed to start actor run")?;

        let envelope: Envelope = Self::read_json(response).await?;
        Self::to_job(&request.source_url, envelope.data)
    }

    async fn poll(&self, job: &ExtractionJob) -> Result<ExtractionJob> {
        let response = self
            .client
            .get(format!("{}/actor-runs/{}", self.base_url, job.job_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to get actor run status")?;

        let envelope: Envelope = Self::read_json(response).await?;
        Self::to_job(&job.source_url, envelope.data)
    }

    async fn fetch_results(&self, dataset_id: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(format!("{}/datasets/{}/items", self.base_url, dataset_id))
            .query(&[("format", "json")])
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to list dataset items")?;

        Self::read_json(response).await
    }
}
