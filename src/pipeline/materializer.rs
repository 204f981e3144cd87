// SYNOID Merge: Upload Materializer
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::fs as tfs;
use tracing::{debug, error, warn};

use super::{SkipReason, SkippedClip, UploadedFile, Workspace};

/// An upload written to disk, still carrying its upload position.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedClip {
    pub ordinal: usize,
    pub filename: String,
    pub path: PathBuf,
}

/// Reduce a browser-supplied name to a single safe path component.
pub fn sanitize_filename(name: &str, ordinal: usize) -> String {
    // Browsers on Windows may send the full client path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        format!("upload_{:03}.mp4", ordinal)
    } else {
        cleaned
    }
}

/// Write every upload with content into the workspace, in upload order.
///
/// Uploads without content, and uploads that cannot be written, are skipped.
/// When two uploads share a name the later one wins: its bytes stay on disk
/// and the earlier entry is dropped from the sequence.
pub async fn materialize(
    workspace: &Workspace,
    uploads: Vec<UploadedFile>,
    skipped: &mut Vec<SkippedClip>,
) -> Vec<MaterializedClip> {
    let mut slots: Vec<Option<MaterializedClip>> = Vec::with_capacity(uploads.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (ordinal, upload) in uploads.into_iter().enumerate() {
        let Some(content) = upload.content else {
            warn!("[MATERIALIZE] Skipping {:?}: upload has no content", upload.filename);
            skipped.push(SkippedClip {
                ordinal,
                filename: upload.filename,
                reason: SkipReason::MissingContent,
            });
            slots.push(None);
            continue;
        };

        let filename = sanitize_filename(&upload.filename, ordinal);
        let path = workspace.upload_path(&filename);
        if let Err(e) = tfs::write(&path, &content).await {
            error!("[MATERIALIZE] Dropping {:?} (#{}): {}", filename, ordinal, e);
            skipped.push(SkippedClip {
                ordinal,
                filename,
                reason: SkipReason::WriteFailed {
                    detail: e.to_string(),
                },
            });
            slots.push(None);
            continue;
        }
        debug!("[MATERIALIZE] #{} {:?} ({} bytes)", ordinal, path, content.len());

        if let Some(previous) = by_name.insert(filename.clone(), slots.len()) {
            if let Some(replaced) = slots[previous].take() {
                warn!(
                    "[MATERIALIZE] {:?} uploaded twice; keeping upload #{}",
                    filename, ordinal
                );
                skipped.push(SkippedClip {
                    ordinal: replaced.ordinal,
                    filename: replaced.filename,
                    reason: SkipReason::SupersededByDuplicate { by: ordinal },
                });
            }
        }

        slots.push(Some(MaterializedClip {
            ordinal,
            filename,
            path,
        }));
    }

    slots.into_iter().flatten().collect()
}
