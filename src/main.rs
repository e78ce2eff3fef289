use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reel_relay::api::{self, ApiServerConfig};
use reel_relay::cli::{Cli, Commands};
use reel_relay::config::Config;
use reel_relay::pipeline::Pipeline;
use reel_relay::utils;

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "reel_relay=debug,tower_http=debug"
    } else {
        "reel_relay=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Report missing tools without stopping (they may appear later, e.g. in containers)
async fn warn_missing_dependencies(config: &Config) {
    let missing = utils::check_dependencies(
        &config.transcode.ffmpeg_path,
        &config.transcode.audio_codec,
    )
    .await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Serve { port } => {
            let mut config = Config::load().await?;
            if let Some(port) = port {
                config.server.port = port;
            }
            warn_missing_dependencies(&config).await;

            let pipeline = Arc::new(Pipeline::from_config(&config).await?);
            api::serve(ApiServerConfig::from_config(&config), pipeline).await?;
        }
        Commands::Process { url } => {
            // Bad input never costs a config load or a run
            let url = utils::validate_and_normalize_url(&url)?;

            let config = Config::load().await?;
            warn_missing_dependencies(&config).await;

            let pipeline = Pipeline::from_config(&config).await?;
            let report = pipeline.execute(&url).await;
            match report.result {
                Ok(response) => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&response.body)?;
                    stdout.write_all(b"\n")?;
                }
                Err(e) => {
                    let kind = e.kind();
                    return Err(anyhow::Error::new(e).context(format!("Failed to process reel ({})", kind)));
                }
            }
        }
        Commands::Config { show } => {
            let config = Config::load_unvalidated().await?;
            if show {
                config.display();
                if let Err(e) = config.validate() {
                    println!("\n⚠️  Configuration incomplete: {}", e);
                }
            } else {
                println!("Edit the config file to change settings:");
                println!("  {}", Config::config_path()?.display());
                println!("Environment overrides: APIFY_TOKEN, STAGING_BUCKET, AWS_REGION, UPLOAD_URL, FFMPEG_PATH, MAX_AUDIO_BYTES, PORT, WORK_DIR");
            }
        }
        Commands::Check => {
            let config = Config::load_unvalidated().await?;
            let missing = utils::check_dependencies(
                &config.transcode.ffmpeg_path,
                &config.transcode.audio_codec,
            )
            .await;
            if missing.is_empty() {
                println!(
                    "{} is available with the {} encoder",
                    config.transcode.ffmpeg_path, config.transcode.audio_codec
                );
            } else {
                for dep in &missing {
                    eprintln!("   • {}", dep);
                }
                anyhow::bail!("{} dependency problem(s) found", missing.len());
            }
        }
    }

    Ok(())
}
