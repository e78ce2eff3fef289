use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub mod s3;

use crate::error::PipelineError;
use crate::utils::{file_size, format_file_size, generate_staging_key};

pub use s3::S3ObjectStore;

/// Remote checkpoint copy of a run's audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedObject {
    pub remote_key: String,
    pub exists: bool,
}

/// Keyed object storage used for staging
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, local_path: &Path, key: &str) -> anyhow::Result<()>;

    async fn get(&self, key: &str, local_path: &Path) -> anyhow::Result<()>;

    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Human-readable location of a key, for logs
    fn describe(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Stages audio through the object store and cleans up after it
#[derive(Clone)]
pub struct StagingClient {
    store: Arc<dyn ObjectStore>,
    key_prefix: String,
    extension: String,
}

impl StagingClient {
    pub fn new(store: Arc<dyn ObjectStore>, key_prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            extension: extension.into(),
        }
    }

    /// Key a run's staged object will be stored under
    pub fn key_for(&self, run_id: &str) -> String {
        generate_staging_key(&self.key_prefix, run_id, &self.extension)
    }

    /// Upload `local_path` under `key`
    pub async fn stage(&self, local_path: &Path, key: &str) -> Result<StagedObject, PipelineError> {
        tracing::info!("Uploading to staging store: {}", self.store.describe(key));

        self.store
            .put(local_path, key)
            .await
            .map_err(|e| PipelineError::Staging(format!("upload of {} failed: {:#}", key, e)))?;

        Ok(StagedObject {
            remote_key: key.to_string(),
            exists: true,
        })
    }

    /// Download the staged object back to `destination`, rejecting an empty copy
    pub async fn retrieve(&self, remote_key: &str, destination: &Path) -> Result<u64, PipelineError> {
        tracing::info!("Downloading from staging store to: {}", destination.display());

        self.store
            .get(remote_key, destination)
            .await
            .map_err(|e| PipelineError::Staging(format!("download of {} failed: {:#}", remote_key, e)))?;

        let size = file_size(destination).await?;
        if size == 0 {
            return Err(PipelineError::StagedEmpty);
        }

        tracing::info!("Staged audio verified, size: {}", format_file_size(size));
        Ok(size)
    }

    /// Delete the staged object if it is still there; an absent key is not an error
    pub async fn purge(&self, remote_key: &str) -> Result<(), PipelineError> {
        let cleanup_error = |e: anyhow::Error| PipelineError::Cleanup {
            target: self.store.describe(remote_key),
            message: format!("{:#}", e),
        };

        if !self.store.exists(remote_key).await.map_err(cleanup_error)? {
            tracing::debug!("Staged object already absent: {}", remote_key);
            return Ok(());
        }

        self.store.delete(remote_key).await.map_err(cleanup_error)?;
        tracing::info!("Staged object deleted: {}", self.store.describe(remote_key));
        Ok(())
    }
}
