// SYNOID Merge: Web Server
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// One route, `/`. GET renders the session page (or the merged file with
// `?download=`), POST carries a multipart form whose `action` field drives
// the session controller, OPTIONS answers preflight.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::pipeline::{
    merge_uploads, MediaToolkit, MergeError, MergeOptions, UploadedFile, OUTPUT_FILENAME,
};
use crate::state::{SessionController, SessionStore};
use crate::ui::render_page;

pub const SESSION_COOKIE: &str = "merge_session";
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct MergeState<T> {
    pub sessions: SessionStore,
    pub toolkit: Arc<T>,
    pub options: MergeOptions,
    pub max_upload_bytes: usize,
    /// Idle sessions older than this are dropped by the sweeper.
    pub session_ttl: Duration,
}

impl<T: MediaToolkit> MergeState<T> {
    pub fn new(toolkit: T, options: MergeOptions, max_upload_bytes: usize) -> Self {
        Self {
            sessions: SessionStore::new(),
            toolkit: Arc::new(toolkit),
            options,
            max_upload_bytes,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

pub type AppState<T> = Arc<MergeState<T>>;

pub fn create_router<T: MediaToolkit + 'static>(state: AppState<T>) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route(
            "/",
            get(show_page::<T>).post(handle_action::<T>).options(preflight),
        )
        .layer(DefaultBodyLimit::max(limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server<T: MediaToolkit + 'static>(
    addr: SocketAddr,
    state: AppState<T>,
) -> anyhow::Result<()> {
    spawn_session_sweeper(Arc::clone(&state));
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("[SERVER] Merge page running on http://{}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Periodically drop idle sessions and the merged output they hold.
fn spawn_session_sweeper<T: MediaToolkit + 'static>(state: AppState<T>) {
    let ttl = state.session_ttl;
    tokio::spawn(async move {
        info!("[SESSION] Sweeper started (ttl: {:?})", ttl);
        loop {
            tokio::time::sleep(SWEEP_INTERVAL.min(ttl).max(Duration::from_secs(1))).await;
            let evicted = state.sessions.evict_idle(ttl);
            if evicted > 0 {
                info!(
                    "[SESSION] Evicted {} idle session(s), {} left",
                    evicted,
                    state.sessions.len()
                );
            }
        }
    });
}

#[derive(Deserialize)]
struct PageQuery {
    download: Option<String>,
}

/// Session id from the request cookie, if it carries a valid one.
pub fn session_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Resolve the caller's session, minting a new id when it has none.
fn resolve_session(headers: &HeaderMap) -> (Uuid, bool) {
    match session_from_headers(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4(), true),
    }
}

fn with_cookie(mut response: Response, id: Uuid, is_new: bool) -> Response {
    if is_new {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

async fn show_page<T: MediaToolkit + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let (id, is_new) = resolve_session(&headers);

    if let Some(requested) = query.download {
        if requested != OUTPUT_FILENAME {
            return StatusCode::NOT_FOUND.into_response();
        }
        let bytes = state
            .sessions
            .get(id, |s| s.output().map(|o| o.bytes.clone()))
            .flatten();
        return match bytes {
            Some(bytes) => (
                [
                    (header::CONTENT_TYPE, "video/mp4".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", OUTPUT_FILENAME),
                    ),
                ],
                bytes,
            )
                .into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        };
    }

    // Only a POST creates a session; until then the page is the fresh view.
    let view = state
        .sessions
        .get(id, |s| s.view())
        .unwrap_or_else(|| SessionController::new().view());
    with_cookie(Html(render_page(&view)).into_response(), id, is_new)
}

async fn preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(header::ALLOW, "GET, POST, OPTIONS")])
}

#[derive(Debug, Default)]
struct ActionForm {
    action: Option<String>,
    files: Vec<UploadedFile>,
}

async fn read_form(multipart: &mut Multipart) -> Result<ActionForm, MultipartError> {
    let mut form = ActionForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        match filename {
            // An unfilled file input still sends a part with an empty name
            Some(filename) if filename.is_empty() => {
                field.bytes().await?;
            }
            Some(filename) => {
                let data = field.bytes().await?;
                form.files.push(UploadedFile::new(filename, data));
            }
            None if name == "action" => form.action = Some(field.text().await?),
            None => {
                field.bytes().await?;
            }
        }
    }

    Ok(form)
}

async fn handle_action<T: MediaToolkit + 'static>(
    State(state): State<AppState<T>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let (id, is_new) = resolve_session(&headers);

    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            error!("[SERVER] Unreadable form from {}: {}", id, e);
            return (e.status(), e.body_text()).into_response();
        }
    };

    match form.action.as_deref() {
        Some("upload") => {
            let count = form.files.len();
            match state.sessions.with_session(id, |s| s.upload(form.files)) {
                Ok(kind) => info!("[SESSION] {} uploaded {} file(s): {}", id, count, kind),
                Err(e) => warn!("[SESSION] {}: {}", id, e),
            }
        }
        Some("merge") => start_merge(&state, id),
        Some("reset") => {
            state.sessions.with_session(id, |s| s.reset());
            info!("[SESSION] {} reset", id);
        }
        other => {
            warn!("[SERVER] Unknown action {:?} from {}", other, id);
            return (StatusCode::BAD_REQUEST, "unknown action").into_response();
        }
    }

    with_cookie(Redirect::to("/").into_response(), id, is_new)
}

/// Put `id` into `Merging` and run the merge on its own task. The caller
/// answers at once, so the browser shows the merging page while it runs.
fn start_merge<T: MediaToolkit + 'static>(state: &AppState<T>, id: Uuid) {
    let uploads = match state.sessions.with_session(id, |s| s.begin_merge()) {
        Ok(uploads) => uploads,
        Err(e) => {
            warn!("[SESSION] {}: {}", id, e);
            return;
        }
    };

    let task_state = Arc::clone(state);
    let task = tokio::spawn(async move {
        let result = merge_uploads(&*task_state.toolkit, uploads, &task_state.options).await;
        task_state.sessions.complete_merge(id, result);
    });

    // A panicking merge must still leave the session out of `Merging`.
    let watch_state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("[SESSION] {} merge task failed: {}", id, e);
            watch_state
                .sessions
                .complete_merge(id, Err(MergeError::Interrupted(e.to_string())));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_headers() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, id)).unwrap(),
        );
        assert_eq!(session_from_headers(&headers), Some(id));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("merge_session=not-a-uuid"));
        assert_eq!(session_from_headers(&headers), None);

        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }
}
