// SYNOID Merge: Session State
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Every browser session owns one `SessionController`. It moves only on user
// events: upload, merge, reset. The server keeps controllers in a store
// keyed by session id, never in process-wide state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::{MergeError, MergedOutput, UploadedFile, OUTPUT_FILENAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    AwaitingUpload,
    FilesListed,
    Merging,
    ResultReady,
    Failed,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Upload,
    Merge,
    MergeFinished,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{event:?} is not allowed while {from}")]
    InvalidTransition { from: PhaseKind, event: SessionEvent },
}

#[derive(Debug, Clone, Default)]
pub enum SessionPhase {
    #[default]
    AwaitingUpload,
    FilesListed {
        files: Vec<UploadedFile>,
    },
    Merging {
        filenames: Vec<String>,
    },
    ResultReady {
        output: MergedOutput,
    },
    Failed {
        message: String,
    },
}

impl SessionPhase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            SessionPhase::AwaitingUpload => PhaseKind::AwaitingUpload,
            SessionPhase::FilesListed { .. } => PhaseKind::FilesListed,
            SessionPhase::Merging { .. } => PhaseKind::Merging,
            SessionPhase::ResultReady { .. } => PhaseKind::ResultReady,
            SessionPhase::Failed { .. } => PhaseKind::Failed,
        }
    }
}

/// A user action rendered as a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Merge,
    Reset,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::Merge => "Merge and Download",
            Action::Reset => "Reset",
        }
    }

    /// Value of the form's `action` field.
    pub fn value(self) -> &'static str {
        match self {
            Action::Merge => "merge",
            Action::Reset => "reset",
        }
    }
}

/// Everything the page shows for the current phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    pub prompt: Option<&'static str>,
    pub lines: Vec<String>,
    pub upload_form: bool,
    pub actions: Vec<Action>,
    /// File name of the download link, if one is offered.
    pub download: Option<&'static str>,
    /// Ask the browser to reload after this many seconds.
    pub refresh_secs: Option<u32>,
}

pub const UPLOAD_PROMPT: &str = "Upload new files to merge:";
pub const MERGING_NOTICE: &str = "Merging files, please wait...";
pub const DOWNLOAD_LABEL: &str = "Download merged video";
pub const MERGING_REFRESH_SECS: u32 = 2;

#[derive(Debug)]
pub struct SessionController {
    phase: SessionPhase,
    last_seen: Instant,
}

impl Default for SessionController {
    fn default() -> Self {
        Self {
            phase: SessionPhase::default(),
            last_seen: Instant::now(),
        }
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the browser last acted on this session.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    fn reject(&self, event: SessionEvent) -> SessionError {
        SessionError::InvalidTransition {
            from: self.kind(),
            event,
        }
    }

    /// Accept the submitted files. An empty submission keeps the upload
    /// prompt up and offers nothing to merge.
    pub fn upload(&mut self, files: Vec<UploadedFile>) -> Result<PhaseKind, SessionError> {
        if self.kind() != PhaseKind::AwaitingUpload {
            return Err(self.reject(SessionEvent::Upload));
        }
        if !files.is_empty() {
            self.phase = SessionPhase::FilesListed { files };
        }
        Ok(self.kind())
    }

    /// Enter `Merging` and hand the uploads to the caller.
    pub fn begin_merge(&mut self) -> Result<Vec<UploadedFile>, SessionError> {
        match std::mem::take(&mut self.phase) {
            SessionPhase::FilesListed { files } => {
                let filenames = files.iter().map(|f| f.filename.clone()).collect();
                self.phase = SessionPhase::Merging { filenames };
                Ok(files)
            }
            other => {
                self.phase = other;
                Err(self.reject(SessionEvent::Merge))
            }
        }
    }

    pub fn finish_merge(
        &mut self,
        result: Result<MergedOutput, MergeError>,
    ) -> Result<PhaseKind, SessionError> {
        if self.kind() != PhaseKind::Merging {
            return Err(self.reject(SessionEvent::MergeFinished));
        }
        self.phase = match result {
            Ok(output) => SessionPhase::ResultReady { output },
            Err(e) => SessionPhase::Failed {
                message: e.user_message().to_string(),
            },
        };
        Ok(self.kind())
    }

    /// Discard everything and go back to the upload prompt. Allowed from any
    /// phase; a merge still running for this session will find it reset and
    /// its result is dropped.
    pub fn reset(&mut self) -> PhaseKind {
        self.phase = SessionPhase::AwaitingUpload;
        self.kind()
    }

    /// Merged bytes, once the session has a result.
    pub fn output(&self) -> Option<&MergedOutput> {
        match &self.phase {
            SessionPhase::ResultReady { output } => Some(output),
            _ => None,
        }
    }

    pub fn view(&self) -> View {
        match &self.phase {
            SessionPhase::AwaitingUpload => View {
                prompt: Some(UPLOAD_PROMPT),
                upload_form: true,
                ..View::default()
            },
            SessionPhase::FilesListed { files } => View {
                lines: uploaded_lines(files.iter().map(|f| f.filename.as_str())),
                actions: vec![Action::Merge],
                ..View::default()
            },
            SessionPhase::Merging { filenames } => {
                let mut lines = uploaded_lines(filenames.iter().map(String::as_str));
                lines.push(MERGING_NOTICE.to_string());
                View {
                    lines,
                    refresh_secs: Some(MERGING_REFRESH_SECS),
                    ..View::default()
                }
            }
            SessionPhase::ResultReady { .. } => View {
                actions: vec![Action::Reset],
                download: Some(OUTPUT_FILENAME),
                ..View::default()
            },
            SessionPhase::Failed { message } => View {
                lines: vec![message.clone()],
                actions: vec![Action::Reset],
                ..View::default()
            },
        }
    }
}

fn uploaded_lines<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names.map(|n| format!("Uploaded: {}", n)).collect()
}

/// Controllers for every live browser session.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SessionController>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the session's controller, creating it on first use.
    /// Counts as activity. Never call this across an await.
    pub fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&mut SessionController) -> R) -> R {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let controller = sessions.entry(id).or_insert_with(|| {
            info!("[SESSION] New session {}", id);
            SessionController::new()
        });
        controller.touch();
        f(controller)
    }

    /// Like `with_session`, but does not create missing sessions.
    pub fn get<R>(&self, id: Uuid, f: impl FnOnce(&SessionController) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get_mut(&id).map(|controller| {
            controller.touch();
            f(&*controller)
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the end of a merge. A session reset or evicted meanwhile is
    /// left as it is.
    pub fn complete_merge(&self, id: Uuid, result: Result<MergedOutput, MergeError>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(session) = sessions.get_mut(&id) else {
            warn!("[SESSION] {} is gone; dropping merge result", id);
            return;
        };
        session.touch();
        match session.finish_merge(result) {
            Ok(kind) => info!("[SESSION] {} finished merge: {}", id, kind),
            Err(e) => warn!("[SESSION] {} dropped merge result: {}", id, e),
        }
    }

    /// Drop sessions idle for longer than `max_idle`, along with any merged
    /// output they hold. Sessions still merging are kept. Returns how many
    /// were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, s| s.kind() == PhaseKind::Merging || s.idle_for() <= max_idle);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MergeReport;
    use axum::body::Bytes;

    fn two_files() -> Vec<UploadedFile> {
        vec![
            UploadedFile::new("a.mp4", b"aaa".to_vec()),
            UploadedFile::new("b.mp4", b"bbb".to_vec()),
        ]
    }

    fn merged() -> MergedOutput {
        MergedOutput {
            bytes: Bytes::from_static(b"merged"),
            report: MergeReport::default(),
        }
    }

    #[test]
    fn test_happy_path_to_result_and_back() {
        let mut s = SessionController::new();
        assert_eq!(s.kind(), PhaseKind::AwaitingUpload);

        assert_eq!(s.upload(two_files()), Ok(PhaseKind::FilesListed));
        let view = s.view();
        assert_eq!(view.lines, ["Uploaded: a.mp4", "Uploaded: b.mp4"]);
        assert_eq!(view.actions, [Action::Merge]);

        let files = s.begin_merge().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(s.kind(), PhaseKind::Merging);
        assert_eq!(s.view().lines.last().map(String::as_str), Some(MERGING_NOTICE));

        assert_eq!(s.finish_merge(Ok(merged())), Ok(PhaseKind::ResultReady));
        let view = s.view();
        assert_eq!(view.download, Some("merged_output.mp4"));
        assert_eq!(view.actions, [Action::Reset]);
        assert_eq!(s.output().unwrap().bytes, Bytes::from_static(b"merged"));

        assert_eq!(s.reset(), PhaseKind::AwaitingUpload);
        assert!(s.output().is_none());
    }

    #[test]
    fn test_empty_upload_stays_awaiting() {
        let mut s = SessionController::new();
        assert_eq!(s.upload(vec![]), Ok(PhaseKind::AwaitingUpload));
        let view = s.view();
        assert!(view.actions.is_empty());
        assert!(view.upload_form);
    }

    #[test]
    fn test_failure_shows_message_and_reset() {
        let mut s = SessionController::new();
        s.upload(two_files()).unwrap();
        s.begin_merge().unwrap();
        let err = MergeError::EmptyClipSet { skipped: vec![] };

        assert_eq!(s.finish_merge(Err(err)), Ok(PhaseKind::Failed));
        let view = s.view();
        assert_eq!(view.actions, [Action::Reset]);
        assert!(view.lines[0].contains("None of the uploaded files"));
        assert!(view.download.is_none());
    }

    #[test]
    fn test_reset_clears_listed_files() {
        let mut s = SessionController::new();
        s.upload(two_files()).unwrap();
        s.reset();

        assert_eq!(
            s.view(),
            View {
                prompt: Some(UPLOAD_PROMPT),
                upload_form: true,
                ..View::default()
            }
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut s = SessionController::new();
        assert_eq!(
            s.begin_merge().unwrap_err(),
            SessionError::InvalidTransition {
                from: PhaseKind::AwaitingUpload,
                event: SessionEvent::Merge
            }
        );

        s.upload(two_files()).unwrap();
        assert!(s.upload(two_files()).is_err());

        s.begin_merge().unwrap();
        // A second merge click while one is running is refused
        assert!(s.begin_merge().is_err());

        s.reset();
        assert!(s.finish_merge(Ok(merged())).is_err());
        assert_eq!(s.kind(), PhaseKind::AwaitingUpload);
    }

    #[test]
    fn test_store_isolates_sessions() {
        let store = SessionStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        store.with_session(a, |s| s.upload(two_files())).unwrap();
        store.with_session(b, |s| s.kind());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a, |s| s.kind()), Some(PhaseKind::FilesListed));
        assert_eq!(store.get(b, |s| s.kind()), Some(PhaseKind::AwaitingUpload));
        assert_eq!(store.get(Uuid::new_v4(), |s| s.kind()), None);
    }

    #[test]
    fn test_store_complete_merge_after_reset_is_dropped() {
        let store = SessionStore::new();
        let id = Uuid::new_v4();
        store.with_session(id, |s| {
            s.upload(two_files()).unwrap();
            s.begin_merge().unwrap();
            s.reset();
        });

        store.complete_merge(id, Ok(merged()));
        assert_eq!(store.get(id, |s| s.kind()), Some(PhaseKind::AwaitingUpload));
    }

    #[test]
    fn test_complete_merge_does_not_create_sessions() {
        let store = SessionStore::new();
        store.complete_merge(Uuid::new_v4(), Ok(merged()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_idle_keeps_running_merges() {
        let store = SessionStore::new();
        let (idle, finished, merging) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.with_session(idle, |s| s.kind());
        store.with_session(finished, |s| {
            s.upload(two_files()).unwrap();
            s.begin_merge().unwrap();
            s.finish_merge(Ok(merged())).unwrap();
        });
        store.with_session(merging, |s| {
            s.upload(two_files()).unwrap();
            s.begin_merge().unwrap();
        });

        assert_eq!(store.evict_idle(Duration::from_secs(3600)), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.evict_idle(Duration::ZERO), 2);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(merging, |s| s.kind()), Some(PhaseKind::Merging));
    }

    #[test]
    fn test_merging_view_asks_for_reload() {
        let mut s = SessionController::new();
        s.upload(two_files()).unwrap();
        assert_eq!(s.view().refresh_secs, None);
        s.begin_merge().unwrap();
        assert_eq!(s.view().refresh_secs, Some(MERGING_REFRESH_SECS));
    }
}
