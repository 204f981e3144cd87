// SYNOID Merge: Session Workspace
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Each merge gets its own scratch directory. Uploads land in `uploads/`,
// intermediates and the rendered output in `render/`, so no upload name can
// collide with anything the pipeline writes.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::fs as tfs;
use tracing::debug;

use super::OUTPUT_FILENAME;

const PREFIX: &str = "synoid-merge-";
const UPLOAD_DIR: &str = "uploads";
const RENDER_DIR: &str = "render";

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a workspace under the system temp directory.
    pub async fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(PREFIX).tempdir()?;
        Self::prepare(dir).await
    }

    /// Create a workspace under `root`, creating `root` if needed.
    pub async fn create_in(root: &Path) -> io::Result<Self> {
        tfs::create_dir_all(root).await?;
        let dir = tempfile::Builder::new().prefix(PREFIX).tempdir_in(root)?;
        Self::prepare(dir).await
    }

    async fn prepare(dir: TempDir) -> io::Result<Self> {
        tfs::create_dir(dir.path().join(UPLOAD_DIR)).await?;
        tfs::create_dir(dir.path().join(RENDER_DIR)).await?;
        debug!("[WORKSPACE] Created {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where an uploaded clip is materialized.
    pub fn upload_path(&self, filename: &str) -> PathBuf {
        self.dir.path().join(UPLOAD_DIR).join(filename)
    }

    /// Per-clip intermediate, keyed by upload position.
    pub fn intermediate_path(&self, ordinal: usize) -> PathBuf {
        self.dir
            .path()
            .join(RENDER_DIR)
            .join(format!("normalized_{:03}.mp4", ordinal))
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(RENDER_DIR).join(OUTPUT_FILENAME)
    }

    /// Remove the directory and report any failure. Dropping without calling
    /// this still removes it, silently.
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("[WORKSPACE] Removed {:?}", path);
        Ok(())
    }
}
