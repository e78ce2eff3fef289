use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "reel-relay",
    about = "Reel Relay - Extract audio from short-video links and forward it to an analysis API",
    version,
    long_about = "Resolves a short-video link through an extraction service, converts the video to audio with ffmpeg, stages it in S3 and uploads it to the configured analysis API. Runs as an HTTP service or one link at a time from the terminal."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Process a single link and print the analysis API response
    Process {
        /// Short-video link to process
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Show the effective configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that ffmpeg and the audio encoder are available
    Check,
}
