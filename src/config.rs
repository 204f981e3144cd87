// SYNOID Merge: Configuration
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::{FfmpegToolkit, MergeOptions};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ERROR_LOG: &str = "merge_errors.log";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 2048;
pub const DEFAULT_SESSION_TTL_MINS: u64 = 60;

/// Settings shared by every subcommand.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// Run the audio-stripping pass before concatenation.
    pub normalize: bool,
    pub error_log: PathBuf,
    pub workspace_root: Option<PathBuf>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            normalize: true,
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            workspace_root: None,
        }
    }
}

impl MergeConfig {
    pub fn toolkit(&self) -> FfmpegToolkit {
        FfmpegToolkit::new(&self.ffmpeg, &self.ffprobe)
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            normalize: self.normalize,
            workspace_root: self.workspace_root.clone(),
        }
    }
}

/// Settings for the `serve` subcommand.
#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_upload_mb: usize,
    /// Minutes a session may sit idle before it and its result are dropped.
    pub session_ttl_mins: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            session_ttl_mins: DEFAULT_SESSION_TTL_MINS,
        }
    }
}

impl ServeConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_mins.saturating_mul(60))
    }
}
