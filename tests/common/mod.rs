#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use reel_relay::download::MediaDownloader;
use reel_relay::extraction::{ExtractionJob, ExtractionService, JobClient, JobRequest, JobStatus};
use reel_relay::staging::{ObjectStore, StagingClient};
use reel_relay::transcode::{AudioEncoder, Transcoder};
use reel_relay::upload::{AttemptError, UploadClient, UploadResponse, UploadTransport};
use reel_relay::utils::Poller;
use reel_relay::{Pipeline, PipelineError, PipelineSettings, Services};

pub const MIB: u64 = 1024 * 1024;

/// Extraction service that reports `final_status` after `polls_until_done` polls
pub struct FakeExtraction {
    pub polls_until_done: u32,
    pub final_status: JobStatus,
    pub items: Vec<Value>,
    pub polls: AtomicU32,
    pub submitted: Mutex<Vec<String>>,
}

impl FakeExtraction {
    pub fn succeeding() -> Self {
        Self {
            polls_until_done: 1,
            final_status: JobStatus::Succeeded,
            items: vec![json!({ "video_url": "https://cdn.example.com/reel.mp4" })],
            polls: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExtractionService for FakeExtraction {
    async fn submit(&self, request: &JobRequest) -> anyhow::Result<ExtractionJob> {
        self.submitted.lock().unwrap().push(request.source_url.clone());
        Ok(ExtractionJob {
            source_url: request.source_url.clone(),
            job_id: format!("job-{}", request.source_url.len()),
            status: JobStatus::Pending,
            dataset_id: None,
            payload: json!({ "status": "READY" }),
        })
    }

    async fn poll(&self, job: &ExtractionJob) -> anyhow::Result<ExtractionJob> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        let status = if n >= self.polls_until_done {
            self.final_status
        } else {
            JobStatus::Running
        };
        Ok(ExtractionJob {
            status,
            dataset_id: Some("dataset".into()),
            payload: json!({ "id": job.job_id, "status": status.as_str() }),
            ..job.clone()
        })
    }

    async fn fetch_results(&self, _dataset_id: &str) -> anyhow::Result<Vec<Value>> {
        Ok(self.items.clone())
    }
}

/// Writes `bytes` bytes to the destination, recording every call
pub struct FakeDownloader {
    pub bytes: u64,
    pub calls: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, PipelineError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        tokio::fs::write(destination, vec![0u8; self.bytes as usize]).await?;
        if self.bytes == 0 {
            return Err(PipelineError::DownloadEmpty);
        }
        Ok(self.bytes)
    }
}

/// Produces an audio file of `bytes` bytes
pub struct FakeEncoder {
    pub bytes: u64,
    pub calls: AtomicU32,
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    async fn encode(&self, _video_path: &Path, audio_path: &Path) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(audio_path, vec![1u8; self.bytes as usize]).await?;
        Ok(())
    }
}

/// In-memory object store
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub puts: Mutex<Vec<String>>,
    pub exists_checks: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
    pub fail_exists: bool,
    /// Reject every put
    pub fail_put: bool,
    /// Hand back an empty file on get
    pub empty_get: bool,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, local_path: &Path, key: &str) -> anyhow::Result<()> {
        if self.fail_put {
            anyhow::bail!("AccessDenied: put on {}", key);
        }
        let data = tokio::fs::read(local_path).await?;
        self.puts.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str, local_path: &Path) -> anyhow::Result<()> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {}", key))?;
        if self.empty_get {
            tokio::fs::write(local_path, b"").await?;
        } else {
            tokio::fs::write(local_path, data).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        self.exists_checks.lock().unwrap().push(key.to_string());
        if self.fail_exists {
            anyhow::bail!("connection reset");
        }
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Fails the first `failures` attempts, then answers `response <attempt>`
pub struct FakeTransport {
    pub failures: u32,
    pub calls: AtomicU32,
    pub uploaded_sizes: Mutex<Vec<u64>>,
}

#[async_trait]
impl UploadTransport for FakeTransport {
    async fn send(&self, file_path: &Path, _endpoint: &str) -> Result<UploadResponse, AttemptError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let size = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| AttemptError::transport(e.to_string()))?
            .len();
        self.uploaded_sizes.lock().unwrap().push(size);

        if attempt <= self.failures {
            return Err(AttemptError {
                status: Some(503),
                body: Some(format!("unavailable {}", attempt)),
                message: format!("HTTP 503: unavailable {}", attempt),
            });
        }
        Ok(UploadResponse {
            status: 200,
            content_type: Some("application/json".into()),
            body: format!(r#"{{"response":{}}}"#, attempt).into_bytes(),
        })
    }
}

/// A pipeline wired to fakes, with handles for assertions
pub struct Harness {
    pub extraction: Arc<FakeExtraction>,
    pub downloader: Arc<FakeDownloader>,
    pub encoder: Arc<FakeEncoder>,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<FakeTransport>,
    pub work_dir: TempDir,
    pub max_audio_bytes: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            extraction: Arc::new(FakeExtraction::succeeding()),
            downloader: Arc::new(FakeDownloader {
                bytes: 4 * MIB,
                calls: Mutex::new(Vec::new()),
            }),
            encoder: Arc::new(FakeEncoder {
                bytes: MIB,
                calls: AtomicU32::new(0),
            }),
            store: Arc::new(MemoryStore::default()),
            transport: Arc::new(FakeTransport {
                failures: 0,
                calls: AtomicU32::new(0),
                uploaded_sizes: Mutex::new(Vec::new()),
            }),
            work_dir: tempfile::tempdir().unwrap(),
            max_audio_bytes: 5 * MIB,
        }
    }

    pub fn with_extraction(mut self, extraction: FakeExtraction) -> Self {
        self.extraction = Arc::new(extraction);
        self
    }

    pub fn with_video_bytes(mut self, bytes: u64) -> Self {
        self.downloader = Arc::new(FakeDownloader {
            bytes,
            calls: Mutex::new(Vec::new()),
        });
        self
    }

    pub fn with_audio_bytes(mut self, bytes: u64) -> Self {
        self.encoder = Arc::new(FakeEncoder {
            bytes,
            calls: AtomicU32::new(0),
        });
        self
    }

    pub fn with_store(mut self, store: MemoryStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn with_upload_failures(mut self, failures: u32) -> Self {
        self.transport = Arc::new(FakeTransport {
            failures,
            calls: AtomicU32::new(0),
            uploaded_sizes: Mutex::new(Vec::new()),
        });
        self
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Services {
                jobs: JobClient::new(
                    self.extraction.clone(),
                    Poller::new(Duration::from_secs(2), 30),
                    true,
                    "video_url",
                ),
                downloader: self.downloader.clone(),
                transcoder: Transcoder::new(self.encoder.clone()),
                staging: StagingClient::new(self.store.clone(), "temp-reel-", "mp3"),
                uploader: UploadClient::new(
                    self.transport.clone(),
                    Poller::new(Duration::from_secs(10), 3),
                ),
            },
            PipelineSettings {
                work_dir: self.work_dir.path().to_path_buf(),
                max_audio_bytes: self.max_audio_bytes,
                audio_extension: "mp3".into(),
                upload_endpoint: "https://analysis.example.com/api/upload".into(),
            },
        )
    }

    /// Files left behind in the work dir
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    pub fn remote_objects(&self) -> usize {
        self.store.objects.lock().unwrap().len()
    }

    pub fn download_calls(&self) -> usize {
        self.downloader.calls.lock().unwrap().len()
    }

    pub fn upload_calls(&self) -> u32 {
        self.transport.calls.load(Ordering::SeqCst)
    }
}
