// SYNOID Merge: Upload-to-Output Pipeline
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Uploads are materialized into a private workspace, optionally stripped of
// audio clip by clip, composed onto one canvas and rendered to a single MP4.
// Per-clip problems are recorded and skipped; only an empty clip set or a
// failed render aborts the merge.

pub mod clips;
pub mod compose;
pub mod materializer;
pub mod normalizer;
pub mod toolkit;
pub mod workspace;
pub mod writer;

use std::fmt;
use std::path::PathBuf;

use axum::body::Bytes;
use thiserror::Error;
use tracing::{error, info, warn};

pub use clips::{ClipHandle, ClipSet};
pub use compose::Canvas;
pub use toolkit::{ClipInfo, FfmpegToolkit, MediaToolkit, ToolError};
pub use workspace::Workspace;

/// File name offered to the browser for the merged result.
pub const OUTPUT_FILENAME: &str = "merged_output.mp4";

/// One file submitted through the upload form.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    /// `None` when the browser sent the entry without a payload.
    pub content: Option<Bytes>,
}

impl UploadedFile {
    /// Empty payloads are treated the same as a missing one.
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            filename: filename.into(),
            content: (!content.is_empty()).then_some(content),
        }
    }

    pub fn missing(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: None,
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }
}

/// Why a clip never reached the concatenation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingContent,
    /// A later upload with the same name overwrote this one.
    SupersededByDuplicate { by: usize },
    /// The upload could not be written into the workspace.
    WriteFailed { detail: String },
    NormalizeFailed { detail: String },
    ProbeFailed { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingContent => write!(f, "upload had no content"),
            SkipReason::SupersededByDuplicate { by } => {
                write!(f, "replaced by upload #{} with the same name", by)
            }
            SkipReason::WriteFailed { detail } => write!(f, "could not store upload: {}", detail),
            SkipReason::NormalizeFailed { detail } => write!(f, "normalization failed: {}", detail),
            SkipReason::ProbeFailed { detail } => write!(f, "could not open clip: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedClip {
    /// Position in the original upload list.
    pub ordinal: usize,
    pub filename: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Names of the clips that were concatenated, in merge order.
    pub merged: Vec<String>,
    pub skipped: Vec<SkippedClip>,
}

#[derive(Debug, Clone)]
pub struct MergedOutput {
    pub bytes: Bytes,
    pub report: MergeReport,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no clips left to merge ({} skipped)", .skipped.len())]
    EmptyClipSet { skipped: Vec<SkippedClip> },
    #[error("rendering the merged video failed: {0}")]
    Render(#[from] ToolError),
    #[error("workspace I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("merge task ended unexpectedly: {0}")]
    Interrupted(String),
}

impl MergeError {
    /// Text shown to the user. Only the empty-result case is specific.
    pub fn user_message(&self) -> &'static str {
        match self {
            MergeError::EmptyClipSet { .. } => {
                "None of the uploaded files could be merged. Please upload valid MP4 files."
            }
            _ => "Merging failed. Details were written to the error log.",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Strip audio and repackage each clip before concatenation.
    pub normalize: bool,
    /// Parent directory for session workspaces; the system temp dir if unset.
    pub workspace_root: Option<PathBuf>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            workspace_root: None,
        }
    }
}

/// Run one merge session from raw uploads to rendered bytes.
///
/// The workspace is removed on every exit path; a panic or a dropped future
/// still removes it through `Drop`.
pub async fn merge_uploads<T: MediaToolkit>(
    toolkit: &T,
    uploads: Vec<UploadedFile>,
    options: &MergeOptions,
) -> Result<MergedOutput, MergeError> {
    let workspace = match &options.workspace_root {
        Some(root) => Workspace::create_in(root).await?,
        None => Workspace::create().await?,
    };
    info!(
        "[PIPELINE] Merging {} upload(s) in {:?}",
        uploads.len(),
        workspace.path()
    );

    let result = run_in_workspace(toolkit, &workspace, uploads, options).await;

    if let Err(e) = workspace.close() {
        warn!("[WORKSPACE] Failed to remove workspace: {}", e);
    }

    match &result {
        Ok(output) => info!(
            "[PIPELINE] Merged {} clip(s) into {} bytes ({} skipped)",
            output.report.merged.len(),
            output.bytes.len(),
            output.report.skipped.len()
        ),
        Err(MergeError::EmptyClipSet { skipped }) => {
            error!("[PIPELINE] Nothing to merge: all {} upload(s) were skipped", skipped.len())
        }
        Err(e) => error!("[PIPELINE] Merge failed: {}", e),
    }
    result
}

async fn run_in_workspace<T: MediaToolkit>(
    toolkit: &T,
    workspace: &Workspace,
    uploads: Vec<UploadedFile>,
    options: &MergeOptions,
) -> Result<MergedOutput, MergeError> {
    let mut skipped = Vec::new();
    let materialized = materializer::materialize(workspace, uploads, &mut skipped).await;

    let mut clips = if options.normalize {
        normalizer::normalize_clips(toolkit, workspace, materialized, &mut skipped).await
    } else {
        normalizer::open_clips(toolkit, materialized, &mut skipped).await
    };

    // Only an empty clip set has no canvas
    let Some(canvas) = Canvas::fit(clips.infos()) else {
        clips.release();
        skipped.sort_by_key(|s| s.ordinal);
        return Err(MergeError::EmptyClipSet { skipped });
    };

    let rendered = writer::write_output(toolkit, workspace, &clips, canvas).await;
    let merged = clips.filenames();
    clips.release();
    let bytes = rendered?;

    skipped.sort_by_key(|s| s.ordinal);
    Ok(MergedOutput {
        bytes,
        report: MergeReport { merged, skipped },
    })
}
