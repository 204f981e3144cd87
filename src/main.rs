// SYNOID Merge Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use tracing::{info, warn};

use synoid_merge::config::{self, MergeConfig, ServeConfig};
use synoid_merge::pipeline::{merge_uploads, UploadedFile};
use synoid_merge::server::{self, MergeState};
use synoid_merge::logging;

#[derive(Parser)]
#[command(name = "synoid-merge")]
#[command(about = "Upload MP4 clips in the browser and download them merged", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// ffmpeg binary used for normalizing and rendering
    #[arg(long, global = true, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe binary used to open clips
    #[arg(long, global = true, default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Concatenate the uploads as-is instead of stripping audio first
    #[arg(long, global = true)]
    no_normalize: bool,

    /// File receiving warnings and errors
    #[arg(long, global = true, default_value = config::DEFAULT_ERROR_LOG)]
    error_log: PathBuf,

    /// Directory for per-merge workspaces (system temp dir by default)
    #[arg(long, global = true)]
    workspace_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the merge page
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to run the server on
        #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
        port: u16,

        /// Largest accepted request body, in MiB
        #[arg(long, default_value_t = config::DEFAULT_MAX_UPLOAD_MB)]
        max_upload_mb: usize,

        /// Minutes before an idle session and its merged video are dropped
        #[arg(long, default_value_t = config::DEFAULT_SESSION_TTL_MINS)]
        session_ttl_mins: u64,
    },

    /// Merge local files without the browser
    Merge {
        /// Input clips, in merge order
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Output video path
        #[arg(short, long, default_value = synoid_merge::pipeline::OUTPUT_FILENAME)]
        output: PathBuf,
    },
}

impl From<&GlobalArgs> for MergeConfig {
    fn from(args: &GlobalArgs) -> Self {
        Self {
            ffmpeg: args.ffmpeg.clone(),
            ffprobe: args.ffprobe.clone(),
            normalize: !args.no_normalize,
            error_log: args.error_log.clone(),
            workspace_root: args.workspace_root.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let cli = Cli::parse();
    let config = MergeConfig::from(&cli.global);
    logging::init(&config.error_log)?;

    info!("--- SYNOID MERGE v{} ---", env!("CARGO_PKG_VERSION"));
    let toolkit = config.toolkit();

    match cli.command {
        Commands::Serve {
            host,
            port,
            max_upload_mb,
            session_ttl_mins,
        } => {
            let missing = toolkit.check().await;
            if !missing.is_empty() {
                warn!("Missing media tools: {:?}. Merges will fail until they are installed.", missing);
            }

            let serve = ServeConfig {
                host,
                port,
                max_upload_mb,
                session_ttl_mins,
            };
            let state = Arc::new(
                MergeState::new(toolkit, config.merge_options(), serve.max_upload_bytes())
                    .with_session_ttl(serve.session_ttl()),
            );
            server::start_server(serve.bind_addr(), state).await?;
        }
        Commands::Merge { inputs, output } => {
            let mut uploads = Vec::with_capacity(inputs.len());
            for path in &inputs {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("cannot read {:?}", path))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                uploads.push(UploadedFile::new(name, bytes));
            }

            let merged = match merge_uploads(&toolkit, uploads, &config.merge_options()).await {
                Ok(merged) => merged,
                Err(e) => bail!("merge failed: {}", e),
            };
            for skip in &merged.report.skipped {
                println!("Skipped #{} {}: {}", skip.ordinal, skip.filename, skip.reason);
            }

            tokio::fs::write(&output, &merged.bytes)
                .await
                .with_context(|| format!("cannot write {:?}", output))?;
            println!(
                "Merged {} clip(s) into {:?} ({:.2} MB)",
                merged.report.merged.len(),
                output,
                merged.bytes.len() as f64 / 1_048_576.0
            );
        }
    }

    Ok(())
}
