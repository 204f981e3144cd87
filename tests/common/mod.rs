#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use synoid_merge::pipeline::{Canvas, ClipHandle, ClipInfo, MediaToolkit, ToolError};

/// Stand-in for ffmpeg: "normalizing" copies the file, "rendering" writes
/// the inputs back to back, so tests can check order by content.
#[derive(Default)]
pub struct ScriptedToolkit {
    /// Input file names whose normalization exits non-zero.
    pub failing: HashSet<String>,
    pub fail_render: bool,
    pub info: Option<ClipInfo>,
    pub normalize_calls: AtomicUsize,
    pub render_calls: AtomicUsize,
    pub rendered: Mutex<Vec<String>>,
    /// When set, rendering waits for one notification before it runs.
    pub render_gate: Option<Arc<Notify>>,
}

impl ScriptedToolkit {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            render_gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

impl MediaToolkit for ScriptedToolkit {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.normalize_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&file_name(input)) {
            return Err(ToolError::NonZeroExit {
                tool: "ffmpeg".to_string(),
                code: 1,
                stderr: format!("{}: Invalid data found when processing input", file_name(input)),
            });
        }
        tokio::fs::copy(input, output).await.unwrap();
        Ok(())
    }

    async fn probe(&self, _path: &Path) -> Result<ClipInfo, ToolError> {
        Ok(self.info.unwrap_or(ClipInfo {
            width: 640,
            height: 360,
            fps: 30.0,
        }))
    }

    async fn render(
        &self,
        clips: &[ClipHandle],
        _canvas: Canvas,
        output: &Path,
    ) -> Result<(), ToolError> {
        if let Some(gate) = &self.render_gate {
            gate.notified().await;
        }
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_render {
            return Err(ToolError::NonZeroExit {
                tool: "ffmpeg".to_string(),
                code: 234,
                stderr: "Conversion failed!".to_string(),
            });
        }

        let mut joined = Vec::new();
        for clip in clips {
            joined.extend(tokio::fs::read(&clip.path).await.unwrap());
        }
        tokio::fs::write(output, joined).await.unwrap();
        *self.rendered.lock().unwrap() = clips.iter().map(|c| c.filename.clone()).collect();
        Ok(())
    }
}
