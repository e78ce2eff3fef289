use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

use crate::error::PipelineError;
use crate::utils::{format_duration, format_file_size};

/// Fetches a remote media resource onto local storage
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Stream `url` into `destination` and return the number of bytes written
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, PipelineError>;
}

/// Streaming HTTP downloader with a browser-like user agent
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::DownloadTransport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn classify(error: reqwest::Error) -> PipelineError {
        if error.is_timeout() {
            PipelineError::DownloadTimeout(error.to_string())
        } else {
            PipelineError::DownloadTransport(error.to_string())
        }
    }
}

#[async_trait]
impl MediaDownloader for HttpDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, PipelineError> {
        tracing::info!("Attempting to download: {}", url);
        let started = Instant::now();

        let response = self.client.get(url).send().await.map_err(Self::classify)?;

        if !response.status().is_success() {
            return Err(PipelineError::DownloadTransport(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Self::classify)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        let size = file.metadata().await?.len();
        if size == 0 {
            return Err(PipelineError::DownloadEmpty);
        }

        tracing::info!(
            "Video downloaded successfully, size: {} ({} bytes streamed) in {}",
            format_file_size(size),
            written,
            format_duration(started.elapsed().as_secs_f64())
        );
        Ok(size)
    }
}
