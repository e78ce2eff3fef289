//! Reel Relay - turns short-video links into audio for a downstream analysis API
//!
//! A link is resolved to a media URL by an external extraction job, downloaded,
//! transcoded to audio with ffmpeg, round-tripped through an S3 staging bucket
//! and finally uploaded as multipart form data. Every transient file and staged
//! object is removed when the run ends, whatever the outcome.

pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod extraction;
pub mod pipeline;
pub mod staging;
pub mod transcode;
pub mod upload;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{Pipeline, PipelineSettings, RunReport, Services, Stage};
pub use upload::UploadResponse;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
