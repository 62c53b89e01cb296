use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use chrono::Duration;
use editlayer_core::store::normalize_path;
use editlayer_core::{
    CommitRecord, CommitReport, CompositeChange, Error, FileView, FsStore, Overlay,
    ProposedChange, ReadOptions, RenameTracker, SharedStorage, TrackedChange,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::warn;

const DEFAULT_RENAME_MAX_AGE_SECS: i64 = 300;

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub overlay: Arc<Mutex<Overlay<FsStore>>>,
    pub tracker: Arc<Mutex<RenameTracker>>,
    pub storage: SharedStorage,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/changes", get(get_pending_changes).post(propose_change))
        .route("/changes/*path", get(peek_change))
        .route("/messages/:id", delete(abandon_message))
        .route("/files/*path", get(view_file))
        .route("/commit", post(commit_changes))
        .route("/renames/*path", get(resolve_rename))
        .route("/history", get(get_history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ApiError> {
    mutex.lock().map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "state lock poisoned".to_string(),
        )
    })
}

fn core_error(e: Error) -> ApiError {
    let status = match &e {
        Error::Drift { .. } | Error::AlreadyExists(_) => StatusCode::CONFLICT,
        Error::MissingTarget(_) => StatusCode::NOT_FOUND,
        Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn get_pending_changes(
    State(state): State<AppState>,
) -> Result<Json<Vec<CompositeChange>>, ApiError> {
    let overlay = lock(&state.overlay)?;
    let composites = overlay
        .ledger()
        .composites()
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(composites))
}

async fn propose_change(
    State(state): State<AppState>,
    Json(req): Json<ProposedChange>,
) -> Result<Json<TrackedChange>, ApiError> {
    if req.kind.path().trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "path must not be empty".to_string()));
    }
    let mut overlay = lock(&state.overlay)?;
    Ok(Json(overlay.propose(req)))
}

async fn peek_change(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<CompositeChange>, ApiError> {
    let overlay = lock(&state.overlay)?;
    overlay
        .peek(&path)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("nothing staged for {path}")))
}

async fn abandon_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut overlay = lock(&state.overlay)?;
    let discarded = overlay.abandon(&id);
    Ok(Json(serde_json::json!({ "discarded": discarded })))
}

#[derive(Deserialize)]
struct ViewQuery {
    #[serde(default)]
    raw: bool,
}

async fn view_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Option<FileView>>, ApiError> {
    let mut overlay = lock(&state.overlay)?;
    let view = if query.raw {
        overlay.read_file(&normalize_path(&path), ReadOptions::raw())
    } else {
        overlay.view(&path)
    };
    view.map(Json).map_err(core_error)
}

#[derive(Deserialize, Default)]
struct CommitRequest {
    paths: Option<Vec<String>>,
}

async fn commit_changes(
    State(state): State<AppState>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<CommitReport>, ApiError> {
    let report = {
        let mut overlay = lock(&state.overlay)?;
        overlay.commit(req.paths.as_deref())
    };

    let storage = lock(&state.storage)?;
    for record in report.outcomes.iter().filter_map(CommitRecord::from_outcome) {
        if let Err(e) = storage.record_commit(&record) {
            warn!(path = %record.path, error = %e, "failed to record commit");
        }
    }

    Ok(Json(report))
}

#[derive(Deserialize)]
struct RenameQuery {
    max_age_secs: Option<i64>,
}

async fn resolve_rename(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<RenameQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let max_age = Duration::seconds(query.max_age_secs.unwrap_or(DEFAULT_RENAME_MAX_AGE_SECS));
    let tracker = lock(&state.tracker)?;
    let resolved = tracker.find_rename(&normalize_path(&path), max_age);
    Ok(Json(serde_json::json!({ "path": resolved })))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CommitRecord>>, ApiError> {
    let storage = lock(&state.storage)?;
    storage
        .get_commit_records(query.limit)
        .map(Json)
        .map_err(core_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use editlayer_core::{ChangeLedger, Storage};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(root: &std::path::Path) -> AppState {
        AppState {
            overlay: Arc::new(Mutex::new(Overlay::new(
                ChangeLedger::new(),
                FsStore::new(root),
            ))),
            tracker: Arc::new(Mutex::new(RenameTracker::new(Duration::hours(24), 200))),
            storage: Arc::new(Mutex::new(Storage::in_memory().unwrap())),
        }
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(temp_dir.path());

        let (status, body) = send(&state, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_propose_view_and_commit() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("notes.md"), "Hello there").unwrap();
        let state = test_state(temp_dir.path());

        let (status, _) = send(
            &state,
            "POST",
            "/changes",
            Some(json!({
                "message_id": "m1",
                "kind": "modify",
                "path": "notes.md",
                "before": "Hello",
                "after": "Hi"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, "GET", "/files/notes.md", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("Hi there"));

        let (_, raw) = send(&state, "GET", "/files/notes.md?raw=true", None).await;
        assert_eq!(raw, json!("Hello there"));

        let (status, report) = send(&state, "POST", "/commit", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["outcomes"][0]["committed"], json!(true));
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("notes.md")).unwrap(),
            "Hi there"
        );

        let (_, history) = send(&state, "GET", "/history", None).await;
        assert_eq!(history[0]["path"], json!("notes.md"));
        assert_eq!(history[0]["kind"], json!("modify"));
    }

    #[tokio::test]
    async fn test_peek_and_abandon() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(temp_dir.path());

        let (status, _) = send(&state, "GET", "/changes/docs/a.md", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(
            &state,
            "POST",
            "/changes",
            Some(json!({
                "message_id": "m1",
                "kind": "create",
                "path": "docs/a.md",
                "after": "draft"
            })),
        )
        .await;

        let (status, composite) = send(&state, "GET", "/changes/docs/a.md", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(composite["kind"], json!("create"));

        let (_, pending) = send(&state, "GET", "/changes", None).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (_, body) = send(&state, "DELETE", "/messages/m1", None).await;
        assert_eq!(body, json!({"discarded": 1}));

        let (_, pending) = send(&state, "GET", "/changes", None).await;
        assert!(pending.as_array().unwrap().is_empty());
        assert!(!temp_dir.path().join("docs/a.md").exists());
    }

    #[tokio::test]
    async fn test_unknown_file_views_as_null() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(temp_dir.path());

        let (status, body) = send(&state, "GET", "/files/missing.md", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_drifted_commit_is_reported_per_path() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.md"), "changed on disk").unwrap();
        let state = test_state(temp_dir.path());

        send(
            &state,
            "POST",
            "/changes",
            Some(json!({
                "message_id": "m1",
                "kind": "modify",
                "path": "a.md",
                "before": "original",
                "after": "edited"
            })),
        )
        .await;

        let (status, report) = send(&state, "POST", "/commit", Some(json!({"paths": ["a.md"]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["outcomes"][0]["committed"], json!(false));
        assert!(report["outcomes"][0]["error"]
            .as_str()
            .unwrap()
            .contains("Drift"));

        let (_, history) = send(&state, "GET", "/history", None).await;
        assert!(history.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_rename() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(temp_dir.path());
        state
            .tracker
            .lock()
            .unwrap()
            .log_rename("notes/a.md", "notes/b.md");

        let (_, body) = send(&state, "GET", "/renames/notes/a.md", None).await;
        assert_eq!(body, json!({"path": "notes/b.md"}));

        let (_, body) = send(&state, "GET", "/renames/other.md?max_age_secs=60", None).await;
        assert_eq!(body, json!({"path": null}));
    }

    #[test]
    fn test_core_error_status() {
        let drift = Error::Drift {
            path: "a".to_string(),
            expected: "1".to_string(),
            found: "2".to_string(),
        };
        assert_eq!(core_error(drift).0, StatusCode::CONFLICT);
        assert_eq!(
            core_error(Error::AlreadyExists("a".to_string())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            core_error(Error::MissingTarget("a".to_string())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            core_error(Error::InvalidPath("..".to_string())).0,
            StatusCode::BAD_REQUEST
        );
    }
}
