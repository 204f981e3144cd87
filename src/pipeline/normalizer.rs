// SYNOID Merge: Per-Clip Normalizer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Each clip is repackaged video-only into its own intermediate
// (`normalized_<ordinal>.mp4`), then opened. A clip whose tool run fails is
// dropped and the merge goes on with the rest. Clips run one at a time.

use tracing::{error, info, warn};

use super::materializer::MaterializedClip;
use super::{ClipHandle, ClipSet, MediaToolkit, SkipReason, SkippedClip, Workspace};

pub async fn normalize_clips<T: MediaToolkit>(
    toolkit: &T,
    workspace: &Workspace,
    clips: Vec<MaterializedClip>,
    skipped: &mut Vec<SkippedClip>,
) -> ClipSet {
    let mut set = ClipSet::new();

    for clip in clips {
        let intermediate = workspace.intermediate_path(clip.ordinal);

        if let Err(e) = toolkit.normalize(&clip.path, &intermediate).await {
            error!(
                "[NORMALIZE] Dropping {:?} (#{}): {}",
                clip.filename, clip.ordinal, e
            );
            remove_partial(&intermediate);
            skipped.push(SkippedClip {
                ordinal: clip.ordinal,
                filename: clip.filename,
                reason: SkipReason::NormalizeFailed {
                    detail: e.to_string(),
                },
            });
            continue;
        }

        match toolkit.probe(&intermediate).await {
            Ok(info) => {
                info!(
                    "[NORMALIZE] {:?} ready ({}x{} @ {:.2} fps)",
                    clip.filename, info.width, info.height, info.fps
                );
                set.push(ClipHandle::owned(clip.ordinal, clip.filename, intermediate, info));
            }
            Err(e) => {
                error!("[NORMALIZE] Cannot open normalized {:?}: {}", clip.filename, e);
                remove_partial(&intermediate);
                skipped.push(SkippedClip {
                    ordinal: clip.ordinal,
                    filename: clip.filename,
                    reason: SkipReason::ProbeFailed {
                        detail: e.to_string(),
                    },
                });
            }
        }
    }

    set
}

/// Open the materialized uploads as they are, without normalization.
pub async fn open_clips<T: MediaToolkit>(
    toolkit: &T,
    clips: Vec<MaterializedClip>,
    skipped: &mut Vec<SkippedClip>,
) -> ClipSet {
    let mut set = ClipSet::new();

    for clip in clips {
        match toolkit.probe(&clip.path).await {
            Ok(info) => set.push(ClipHandle::borrowed(clip.ordinal, clip.filename, clip.path, info)),
            Err(e) => {
                error!("[OPEN] Cannot open {:?}: {}", clip.filename, e);
                skipped.push(SkippedClip {
                    ordinal: clip.ordinal,
                    filename: clip.filename,
                    reason: SkipReason::ProbeFailed {
                        detail: e.to_string(),
                    },
                });
            }
        }
    }

    set
}

fn remove_partial(path: &std::path::Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("[NORMALIZE] Could not remove partial output {:?}: {}", path, e);
        }
    }
}
