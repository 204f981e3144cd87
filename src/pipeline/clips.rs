// SYNOID Merge: Clip Handles
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::ClipInfo;

/// An opened clip, ready for concatenation.
#[derive(Debug)]
pub struct ClipHandle {
    pub ordinal: usize,
    pub filename: String,
    pub path: PathBuf,
    pub info: ClipInfo,
    /// The handle owns its file (a normalized intermediate) and deletes it
    /// on release. Raw uploads belong to the workspace instead.
    owns_file: bool,
}

impl ClipHandle {
    pub fn borrowed(ordinal: usize, filename: String, path: PathBuf, info: ClipInfo) -> Self {
        Self {
            ordinal,
            filename,
            path,
            info,
            owns_file: false,
        }
    }

    pub fn owned(ordinal: usize, filename: String, path: PathBuf, info: ClipInfo) -> Self {
        Self {
            owns_file: true,
            ..Self::borrowed(ordinal, filename, path, info)
        }
    }

    pub fn owns_file(&self) -> bool {
        self.owns_file
    }
}

/// Every handle opened for one merge. `release` runs once after rendering;
/// dropping an unreleased set releases it.
#[derive(Debug, Default)]
pub struct ClipSet {
    handles: Vec<ClipHandle>,
    released: bool,
}

impl ClipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: ClipHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[ClipHandle] {
        &self.handles
    }

    pub fn infos(&self) -> impl Iterator<Item = &ClipInfo> {
        self.handles.iter().map(|h| &h.info)
    }

    pub fn filenames(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.filename.clone()).collect()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Delete every owned file. Returns how many were removed.
    pub fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        let mut removed = 0;
        for handle in self.handles.iter().filter(|h| h.owns_file) {
            match fs::remove_file(&handle.path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("[CLIPS] Could not release {:?}: {}", handle.path, e),
            }
        }
        debug!("[CLIPS] Released {} handle(s), {} file(s) removed", self.handles.len(), removed);
        removed
    }
}

impl Drop for ClipSet {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INFO: ClipInfo = ClipInfo { width: 640, height: 360, fps: 30.0 };

    #[test]
    fn test_release_only_removes_owned_files() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("a.mp4");
        let normalized = dir.path().join("normalized_001.mp4");
        fs::write(&raw, b"raw").unwrap();
        fs::write(&normalized, b"norm").unwrap();

        let mut set = ClipSet::new();
        set.push(ClipHandle::borrowed(0, "a.mp4".into(), raw.clone(), INFO));
        set.push(ClipHandle::owned(1, "b.mp4".into(), normalized.clone(), INFO));

        assert_eq!(set.release(), 1);
        assert!(raw.exists());
        assert!(!normalized.exists());
        assert!(set.is_released());
        assert_eq!(set.release(), 0);
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        let normalized = dir.path().join("normalized_000.mp4");
        fs::write(&normalized, b"norm").unwrap();

        {
            let mut set = ClipSet::new();
            set.push(ClipHandle::owned(0, "a.mp4".into(), normalized.clone(), INFO));
        }
        assert!(!normalized.exists());
    }
}
