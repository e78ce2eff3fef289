use anyhow::{Context, Result};
use aws_config::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::mask_secret;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extraction actor service
    pub extraction: ExtractionConfig,

    /// Source video download
    pub download: DownloadConfig,

    /// Audio transcoding
    pub transcode: TranscodeConfig,

    /// Staging object store
    pub staging: StagingConfig,

    /// Downstream analysis API
    pub upload: UploadConfig,

    /// HTTP gateway and local storage
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Base URL of the actor API
    pub api_base_url: String,

    /// API token
    pub api_token: String,

    /// Actor that turns a reel link into a media URL
    pub actor_id: String,

    /// Seconds between status polls
    pub poll_interval_secs: u64,

    /// Status polls before giving up
    pub max_poll_attempts: u32,

    /// Route the actor through the service's proxy pool
    pub use_proxy: bool,

    /// Field of the first result item holding the media URL
    pub result_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Location of the ffmpeg binary
    pub ffmpeg_path: String,

    /// Audio encoder passed to ffmpeg
    pub audio_codec: String,

    /// Extension of the produced audio file
    pub output_extension: String,

    /// Largest audio file accepted for upload
    pub max_audio_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// AWS region
    pub region: String,

    /// Bucket for staged audio
    pub bucket: String,

    /// Prefix prepended to every staged key
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: String,

    /// Multipart field carrying the file
    pub field_name: String,

    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,

    /// Directory for transient files (a private temp dir when unset)
    pub work_dir: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.apify.com/v2".to_string(),
            api_token: String::new(),
            actor_id: "presetshubham~instagram-reel-downloader".to_string(),
            poll_interval_secs: 2,
            max_poll_attempts: 30,
            use_proxy: true,
            result_field: "video_url".to_string(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            audio_codec: "libmp3lame".to_string(),
            output_extension: "mp3".to_string(),
            max_audio_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            bucket: String::new(),
            key_prefix: "temp-reel-".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://scenefinder-upload-backend.onrender.com/api/upload".to_string(),
            field_name: "video".to_string(),
            max_attempts: 3,
            backoff_secs: 10,
            timeout_secs: 120,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            work_dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            download: DownloadConfig::default(),
            transcode: TranscodeConfig::default(),
            staging: StagingConfig::default(),
            upload: UploadConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file (or create default), apply env overrides, validate
    pub async fn load() -> Result<Self> {
        let config = Self::load_unvalidated().await?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration and env overrides without checking required settings
    pub async fn load_unvalidated() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content)
                .context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save().await?;
            config
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("reel-relay").join("config.yaml"))
    }

    /// Apply environment overrides; `lookup` returns the value of a variable if set
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("APIFY_TOKEN") {
            self.extraction.api_token = token;
        }
        if let Some(bucket) = non_empty("STAGING_BUCKET") {
            self.staging.bucket = bucket;
        }
        if let Some(region) = non_empty("AWS_REGION") {
            self.staging.region = region;
        }
        if let Some(endpoint) = non_empty("UPLOAD_URL") {
            self.upload.endpoint = endpoint;
        }
        if let Some(path) = non_empty("FFMPEG_PATH") {
            self.transcode.ffmpeg_path = path;
        }
        if let Some(max) = non_empty("MAX_AUDIO_BYTES") {
            self.transcode.max_audio_bytes = max
                .parse()
                .with_context(|| format!("MAX_AUDIO_BYTES is not a byte count: {}", max))?;
        }
        if let Some(port) = non_empty("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", port))?;
        }
        if let Some(dir) = non_empty("WORK_DIR") {
            self.server.work_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extraction.api_token.is_empty() {
            anyhow::bail!("Extraction API token must be configured (APIFY_TOKEN)");
        }

        if self.staging.bucket.is_empty() {
            anyhow::bail!("Staging bucket must be configured (STAGING_BUCKET)");
        }

        let endpoint = url::Url::parse(&self.upload.endpoint)
            .with_context(|| format!("Invalid upload endpoint: {}", self.upload.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("Upload endpoint must use HTTP or HTTPS protocol");
        }

        if self.extraction.max_poll_attempts == 0 || self.upload.max_attempts == 0 {
            anyhow::bail!("Attempt limits must be at least 1");
        }

        if self.transcode.max_audio_bytes == 0 {
            anyhow::bail!("max_audio_bytes must be greater than zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Extraction API: {}", self.extraction.api_base_url);
        println!("  Extraction Token: {}", mask_secret(&self.extraction.api_token));
        println!("  Actor: {}", self.extraction.actor_id);
        println!(
            "  Polling: every {}s, up to {} attempts",
            self.extraction.poll_interval_secs, self.extraction.max_poll_attempts
        );
        println!("  FFmpeg: {} ({})", self.transcode.ffmpeg_path, self.transcode.audio_codec);
        println!("  Max Audio Size: {} bytes", self.transcode.max_audio_bytes);
        println!("  Staging: s3://{}/{}*", self.staging.bucket, self.staging.key_prefix);
        println!("  Region: {}", self.staging.region);
        println!("  Upload Endpoint: {}", self.upload.endpoint);
        println!("  Listen: {}:{}", self.server.bind_address, self.server.port);
        if let Some(dir) = &self.server.work_dir {
            println!("  Work Dir: {}", dir.display());
        }
    }

    /// Get AWS region
    pub fn aws_region(&self) -> Region {
        Region::new(self.staging.region.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.extraction.poll_interval_secs)
    }

    pub fn upload_backoff(&self) -> Duration {
        Duration::from_secs(self.upload.backoff_secs)
    }
}
