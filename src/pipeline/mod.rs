use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::Instrument;

pub mod run;

use crate::config::Config;
use crate::download::{HttpDownloader, MediaDownloader};
use crate::error::PipelineError;
use crate::extraction::{ApifyService, JobClient};
use crate::staging::{S3ObjectStore, StagingClient};
use crate::transcode::{FfmpegEncoder, Transcoder};
use crate::upload::{MultipartTransport, UploadClient, UploadResponse};
use crate::utils::{self, Poller};

pub use run::{ArtifactKind, PipelineRun, Stage, TransientArtifact};

/// Per-process pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory transient files are written to
    pub work_dir: PathBuf,

    /// Largest transcoded audio accepted
    pub max_audio_bytes: u64,

    pub audio_extension: String,

    /// Downstream analysis API
    pub upload_endpoint: String,
}

/// Everything known about a finished run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,

    /// Stage the run was in when it failed
    pub failed_stage: Option<Stage>,

    pub result: Result<UploadResponse, PipelineError>,

    /// Cleanup failures; these never change `result`
    pub cleanup_errors: Vec<PipelineError>,
}

/// Collaborators shared by every run
pub struct Services {
    pub jobs: JobClient,
    pub downloader: Arc<dyn MediaDownloader>,
    pub transcoder: Transcoder,
    pub staging: StagingClient,
    pub uploader: UploadClient,
}

/// The fixed extraction → download → transcode → stage → upload workflow
pub struct Pipeline {
    services: Services,
    settings: PipelineSettings,
    // Keeps the default work dir alive for the pipeline's lifetime
    _temp_dir: Option<TempDir>,
}

impl Pipeline {
    pub fn new(services: Services, settings: PipelineSettings) -> Self {
        Self {
            services,
            settings,
            _temp_dir: None,
        }
    }

    /// Wire up the production collaborators described by `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let jobs = JobClient::new(
            Arc::new(ApifyService::new(
                http,
                &config.extraction.api_base_url,
                &config.extraction.api_token,
                &config.extraction.actor_id,
            )),
            Poller::new(config.poll_interval(), config.extraction.max_poll_attempts),
            config.extraction.use_proxy,
            &config.extraction.result_field,
        );

        let downloader = HttpDownloader::new(
            std::time::Duration::from_secs(config.download.timeout_secs),
            &config.download.user_agent,
        )?;

        let transcoder = Transcoder::new(Arc::new(FfmpegEncoder::new(
            &config.transcode.ffmpeg_path,
            &config.transcode.audio_codec,
        )));

        let mime_type = utils::audio_mime_type(&config.transcode.output_extension);
        let store = S3ObjectStore::from_env(config.aws_region(), &config.staging.bucket)
            .await
            .with_content_type(mime_type);
        let staging = StagingClient::new(
            Arc::new(store),
            &config.staging.key_prefix,
            &config.transcode.output_extension,
        );

        let transport = MultipartTransport::new(
            std::time::Duration::from_secs(config.upload.timeout_secs),
            &config.upload.field_name,
        )?
        .with_mime_type(mime_type);
        let uploader = UploadClient::new(
            Arc::new(transport),
            Poller::new(config.upload_backoff(), config.upload.max_attempts),
        );

        let (work_dir, temp_dir) = match &config.server.work_dir {
            Some(dir) => {
                fs_err::create_dir_all(dir)?;
                (dir.clone(), None)
            }
            None => {
                let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
                (temp_dir.path().to_path_buf(), Some(temp_dir))
            }
        };

        let mut pipeline = Self::new(
            Services {
                jobs,
                downloader: Arc::new(downloader),
                transcoder,
                staging,
                uploader,
            },
            PipelineSettings {
                work_dir,
                max_audio_bytes: config.transcode.max_audio_bytes,
                audio_extension: config.transcode.output_extension.clone(),
                upload_endpoint: config.upload.endpoint.clone(),
            },
        );
        pipeline._temp_dir = temp_dir;
        Ok(pipeline)
    }

    pub fn work_dir(&self) -> &Path {
        &self.settings.work_dir
    }

    /// Process one link and return the downstream response
    pub async fn process(&self, input_url: &str) -> Result<UploadResponse, PipelineError> {
        self.execute(input_url).await.result
    }

    /// Process one link, always cleaning up, and report how it went
    pub async fn execute(&self, input_url: &str) -> RunReport {
        let mut run = PipelineRun::new(input_url);
        let span = tracing::info_span!("run", run_id = %run.run_id);

        async {
            tracing::info!("Input URL: {}", run.input_url);

            let result = self.drive(&mut run).await;
            let failed_stage = result.is_err().then(|| run.stage());

            run.advance(Stage::Cleanup);
            let cleanup_errors = run.cleanup(&self.services.staging).await;

            match &result {
                Ok(_) => {
                    run.advance(Stage::Succeeded);
                    tracing::info!("Run finished");
                }
                Err(e) => {
                    run.advance(Stage::Failed);
                    tracing::error!(
                        "Run failed during {}: {} ({})",
                        failed_stage.unwrap_or(Stage::Started),
                        e,
                        e.kind()
                    );
                }
            }

            RunReport {
                run_id: run.run_id.clone(),
                failed_stage,
                result,
                cleanup_errors,
            }
        }
        .instrument(span)
        .await
    }

    fn artifact_path(&self, run: &PipelineRun, kind: ArtifactKind) -> PathBuf {
        self.settings
            .work_dir
            .join(kind.file_name(&run.run_id, &self.settings.audio_extension))
    }

    async fn drive(&self, run: &mut PipelineRun) -> Result<UploadResponse, PipelineError> {
        let services = &self.services;

        run.advance(Stage::Extracting);
        let media_url = services.jobs.submit_and_await(&run.input_url).await?;

        run.advance(Stage::Downloading);
        let video_path = self.artifact_path(run, ArtifactKind::Video);
        run.register_artifact(ArtifactKind::Video, video_path.clone());
        let video_size = services.downloader.download(&media_url, &video_path).await?;
        run.record_size(ArtifactKind::Video, video_size);

        run.advance(Stage::Transcoding);
        let audio_path = self.artifact_path(run, ArtifactKind::AudioRaw);
        run.register_artifact(ArtifactKind::AudioRaw, audio_path.clone());
        let audio_size = services
            .transcoder
            .extract_audio(&video_path, &audio_path, self.settings.max_audio_bytes)
            .await?;
        run.record_size(ArtifactKind::AudioRaw, audio_size);

        run.advance(Stage::StagingUpload);
        let key = services.staging.key_for(&run.run_id);
        run.register_staged_key(&key);
        let staged = services.staging.stage(&audio_path, &key).await?;
        run.mark_staged(staged);

        run.advance(Stage::StagingVerify);
        let staged_path = self.artifact_path(run, ArtifactKind::AudioStaged);
        run.register_artifact(ArtifactKind::AudioStaged, staged_path.clone());
        let staged_size = services.staging.retrieve(&key, &staged_path).await?;
        run.record_size(ArtifactKind::AudioStaged, staged_size);

        run.advance(Stage::Uploading);
        services
            .uploader
            .upload(&staged_path, &self.settings.upload_endpoint)
            .await
    }
}
