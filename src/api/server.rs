//! API server setup and configuration.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::api::{router, AppState};
use crate::config::Config;
use crate::pipeline::Pipeline;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
}

impl ApiServerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_address: config.server.bind_address.clone(),
            port: config.server.port,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.bind_address, self.port))
    }
}

/// Serve the gateway until Ctrl-C.
pub async fn serve(server: ApiServerConfig, pipeline: Arc<Pipeline>) -> Result<()> {
    let addr = server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server running on {}", addr);
    tracing::info!("Transient files go to {}", pipeline.work_dir().display());

    let state = AppState::new(pipeline);
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    // Runs whose clients already left still own staged objects and files
    state.drain().await;
    tracing::info!("All runs finished");

    Ok(())
}
