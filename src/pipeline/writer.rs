// SYNOID Merge: Output Writer
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use axum::body::Bytes;
use tokio::fs as tfs;
use tracing::info;

use super::{Canvas, ClipSet, MediaToolkit, MergeError, Workspace};

/// Render `clips` onto `canvas` into the workspace output file and read it
/// back.
///
/// The caller still owns `clips` and releases them whatever this returns.
pub async fn write_output<T: MediaToolkit>(
    toolkit: &T,
    workspace: &Workspace,
    clips: &ClipSet,
    canvas: Canvas,
) -> Result<Bytes, MergeError> {
    let output = workspace.output_path();

    toolkit.render(clips.handles(), canvas, &output).await?;

    let bytes = tfs::read(&output).await?;
    info!("[RENDER] Wrote {:?} ({} bytes)", output, bytes.len());
    Ok(Bytes::from(bytes))
}
