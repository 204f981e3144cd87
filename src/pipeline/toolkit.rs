// SYNOID Merge: Media Toolkit
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// The pipeline never decodes video itself. Normalizing, probing and
// rendering all go through `MediaToolkit`; production shells out to the
// ffmpeg/ffprobe CLI.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use super::compose::{compose_filter, OUTPUT_LABEL};
use super::{Canvas, ClipHandle};

/// Stream properties of an opened clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with status {code}: {stderr}")]
    NonZeroExit {
        tool: String,
        /// -1 when the process was killed by a signal.
        code: i32,
        stderr: String,
    },
    #[error("could not read stream info for {path:?}: {reason}")]
    Probe { path: PathBuf, reason: String },
}

pub trait MediaToolkit: Send + Sync {
    /// Copy the first video stream of `input` into `output` untouched,
    /// dropping every audio stream.
    fn normalize(
        &self,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<(), ToolError>> + Send;

    /// Open a clip far enough to learn its dimensions and frame rate.
    fn probe(&self, path: &Path) -> impl Future<Output = Result<ClipInfo, ToolError>> + Send;

    /// Concatenate `clips` in order onto `canvas` and encode to `output`.
    fn render(
        &self,
        clips: &[ClipHandle],
        canvas: Canvas,
        output: &Path,
    ) -> impl Future<Output = Result<(), ToolError>> + Send;
}

#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Names of the configured binaries that do not answer `-version`.
    pub async fn check(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for bin in [&self.ffmpeg, &self.ffprobe] {
            let ok = Command::new(bin)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|s| s.success())
                .unwrap_or(false);
            if !ok {
                missing.push(bin.display().to_string());
            }
        }
        missing
    }
}

impl MediaToolkit for FfmpegToolkit {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        debug!("[NORMALIZE] {:?} -> {:?}", input, output);
        run_tool(&self.ffmpeg, normalize_args(input, output)).await?;
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<ClipInfo, ToolError> {
        let out = run_tool(&self.ffprobe, probe_args(path)).await?;
        let text = String::from_utf8_lossy(&out.stdout);
        parse_probe_output(&text).map_err(|reason| ToolError::Probe {
            path: path.to_path_buf(),
            reason,
        })
    }

    async fn render(
        &self,
        clips: &[ClipHandle],
        canvas: Canvas,
        output: &Path,
    ) -> Result<(), ToolError> {
        let inputs: Vec<&Path> = clips.iter().map(|c| c.path.as_path()).collect();
        info!(
            "[RENDER] Composing {} clip(s) onto {}x{} @ {:.3} fps",
            inputs.len(),
            canvas.width,
            canvas.height,
            canvas.fps
        );
        run_tool(&self.ffmpeg, render_args(&inputs, canvas, output)).await?;
        Ok(())
    }
}

async fn run_tool(bin: &Path, args: Vec<OsString>) -> Result<Output, ToolError> {
    let tool = bin.display().to_string();
    let output = Command::new(bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(ToolError::NonZeroExit {
            tool,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

// Every invocation keeps ffmpeg quiet except for real errors.
const QUIET: [&str; 4] = ["-hide_banner", "-nostats", "-loglevel", "error"];

pub fn normalize_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];
    args.extend(QUIET.iter().map(OsString::from));
    args.push("-i".into());
    args.push(input.into());
    args.extend(
        ["-map", "0:v:0", "-c:v", "copy", "-an"]
            .iter()
            .map(OsString::from),
    );
    args.push(output.into());
    args
}

pub fn probe_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height,r_frame_rate,avg_frame_rate",
        "-of",
        "json",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(path.into());
    args
}

pub fn render_args(inputs: &[&Path], canvas: Canvas, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];
    args.extend(QUIET.iter().map(OsString::from));
    for input in inputs {
        args.push("-i".into());
        args.push((*input).into());
    }
    args.push("-filter_complex".into());
    args.push(compose_filter(inputs.len(), canvas).into());
    args.extend(
        [
            "-map",
            OUTPUT_LABEL,
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-crf",
            "23",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]
        .iter()
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

pub fn parse_probe_output(text: &str) -> Result<ClipInfo, String> {
    let probe: ProbeOutput = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };

    // avg_frame_rate is 0/0 for some streams; fall back to r_frame_rate
    let fps = [stream.avg_frame_rate, stream.r_frame_rate]
        .into_iter()
        .flatten()
        .map(|r| parse_fps_ratio(&r))
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);

    Ok(ClipInfo { width, height, fps })
}

fn parse_fps_ratio(s: &str) -> f64 {
    let parts: Vec<f64> = s.split('/').filter_map(|p| p.parse().ok()).collect();
    match parts.as_slice() {
        [num, den] if *den != 0.0 => num / den,
        [value] => *value,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_args_copy_video_drop_audio() {
        let args = normalize_args(Path::new("/ws/a.mp4"), Path::new("/ws/render/n.mp4"));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.windows(2).any(|w| w == ["-i", "/ws/a.mp4"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/ws/render/n.mp4"));
    }

    #[test]
    fn test_render_args_keep_input_order() {
        let canvas = Canvas { width: 640, height: 360, fps: 30.0 };
        let inputs = [Path::new("b.mp4"), Path::new("a.mp4")];
        let args = render_args(&inputs, canvas, Path::new("out.mp4"));
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        let inputs: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(inputs, ["b.mp4", "a.mp4"]);
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-loglevel", "error"]));
        assert!(args.windows(2).any(|w| w == ["-map", "[outv]"]));
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{"streams":[{"width":1280,"height":720,"r_frame_rate":"30000/1001","avg_frame_rate":"0/0"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.fps - 29.97).abs() < 0.01);

        assert!(parse_probe_output(r#"{"streams":[]}"#).is_err());
        assert!(parse_probe_output(r#"{}"#).is_err());
        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_parse_fps_ratio() {
        assert_eq!(parse_fps_ratio("25/1"), 25.0);
        assert_eq!(parse_fps_ratio("24"), 24.0);
        assert_eq!(parse_fps_ratio("0/0"), 0.0);
        assert_eq!(parse_fps_ratio(""), 0.0);
    }
}
