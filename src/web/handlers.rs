use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::camera::{CameraRequest, CameraUpdate};
use crate::detection::Violation;
use crate::streaming::{mjpeg_content_type, mjpeg_stream};
use crate::supervisor::{CameraStatusReport, CameraSummary};

const DEFAULT_VIOLATION_LIMIT: usize = 100;
const MAX_VIOLATION_LIMIT: usize = 1000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    cameras_running: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    status: String,
    message: String,
}

impl MessageResponse {
    fn success(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "success".to_string(),
            message: message.into(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationQuery {
    camera_id: Option<String>,
    limit: Option<usize>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cameras_running: state.supervisor.running_cameras().len(),
    })
}

pub async fn list_cameras(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CameraSummary>>, ApiError> {
    Ok(Json(state.supervisor.list_cameras().await?))
}

pub async fn add_camera(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CameraRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let config = request.validate()?;
    let id = config.id.clone();

    let started = state.supervisor.add_camera(config).await?;
    info!(camera_id = %id, started, "add camera request");

    Ok(MessageResponse::success(if started {
        format!("Camera {id} added")
    } else {
        format!("Camera {id} is already being monitored")
    }))
}

pub async fn update_camera(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<CameraUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(update) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let updated = state.supervisor.update_camera(&id, update).await?;
    Ok(MessageResponse::success(format!(
        "Camera {} updated ({})",
        id,
        if updated.is_active() { "active" } else { "inactive" }
    )))
}

pub async fn delete_camera(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.supervisor.remove_camera(&id).await?;
    Ok(MessageResponse::success(if removed {
        format!("Camera {id} removed")
    } else {
        format!("Camera {id} was not configured")
    }))
}

pub async fn camera_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<CameraStatusReport> {
    Json(state.supervisor.camera_status(&id))
}

/// MJPEG stream of a camera's latest frames. Unknown cameras get an empty body.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let body = match state.supervisor.broadcaster().subscribe(&id) {
        Some(frames) => {
            debug!(camera_id = %id, "stream consumer attached");
            Body::from_stream(mjpeg_stream(frames))
        }
        None => {
            debug!(camera_id = %id, "stream requested for unmonitored camera");
            Body::empty()
        }
    };

    Response::builder()
        .header(CONTENT_TYPE, mjpeg_content_type())
        .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .body(body)
        .map_err(|e| ApiError::internal(format!("failed to build stream response: {e}")))
}

pub async fn list_violations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViolationQuery>,
) -> Result<Json<Vec<Violation>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_VIOLATION_LIMIT)
        .min(MAX_VIOLATION_LIMIT);
    let db = state.supervisor.recorder().database().clone();

    let violations = tokio::task::spawn_blocking(move || {
        db.list_violations(query.camera_id.as_deref(), limit)
    })
    .await
    .map_err(|e| ApiError::internal(format!("query task failed: {e}")))??;

    Ok(Json(violations))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use futures::StreamExt;

    use super::*;
    use crate::config::CameraStore;
    use crate::detection::{Classifier, DisabledClassifier};
    use crate::supervisor::Supervisor;
    use crate::testing::{wait_until, worker_context, FixedClassifier, ScriptedSource};

    fn state(dir: &std::path::Path, classifier: Arc<dyn Classifier>) -> Arc<AppState> {
        let ctx = worker_context(dir, Arc::new(ScriptedSource::new()), classifier);
        let store = Arc::new(CameraStore::new(dir.join("camera_config.json")));
        let supervisor = Supervisor::new(
            store,
            ctx,
            Duration::from_millis(500),
            Duration::from_secs(60),
        );
        Arc::new(AppState::new(Arc::new(supervisor)))
    }

    fn request(id: &str, port: u32) -> CameraRequest {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "ipAddress": "192.168.0.40",
            "port": port,
            "monitoredViolations": ["no_helmet"],
        }))
        .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_add_camera_then_status_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(DisabledClassifier::default()));

        let Json(added) = add_camera(State(state.clone()), Ok(Json(request("cam1", 554))))
            .await
            .unwrap();
        assert_eq!(added.status, "success");

        let supervisor = state.supervisor.clone();
        assert!(wait_until(move || supervisor.broadcaster().latest("cam1").is_some()).await);

        let Json(report) = camera_status(State(state.clone()), Path("cam1".to_string())).await;
        let report = serde_json::to_value(report).unwrap();
        assert_eq!(report["status"], "active");
        assert!(report["lastChecked"].is_string());

        let Json(deleted) = delete_camera(State(state.clone()), Path("cam1".to_string()))
            .await
            .unwrap();
        assert_eq!(deleted.status, "success");

        let Json(report) = camera_status(State(state.clone()), Path("cam1".to_string())).await;
        assert_eq!(serde_json::to_value(report).unwrap()["status"], "inactive");

        // Deleting again is not an error
        assert!(delete_camera(State(state), Path("cam1".to_string())).await.is_ok());
    }

    #[tokio::test]
    async fn test_add_camera_rejects_invalid_port() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(DisabledClassifier::default()));

        let err = add_camera(State(state.clone()), Ok(Json(request("cam1", 70000))))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let body = body_json(err.into_response()).await;
        assert_eq!(body["status"], "error");
        assert!(state.supervisor.running_cameras().is_empty());
        assert!(state.supervisor.store().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_camera_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(DisabledClassifier::default()));

        let err = update_camera(
            State(state),
            Path("ghost".to_string()),
            Ok(Json(CameraUpdate::default())),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_of_unknown_camera_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(DisabledClassifier::default()));

        let response = stream(State(state), Path("nope".to_string())).await.unwrap();
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=frame"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_stream_emits_jpeg_parts() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(DisabledClassifier::default()));
        add_camera(State(state.clone()), Ok(Json(request("cam1", 554))))
            .await
            .unwrap();

        let response = stream(State(state.clone()), Path("cam1".to_string()))
            .await
            .unwrap();
        let mut parts = response.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_secs(2), parts.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n"));

        state.supervisor.remove_camera("cam1").await.unwrap();
        let rest = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(part) = parts.next().await {
                part.unwrap();
            }
        })
        .await;
        assert!(rest.is_ok());
    }

    #[tokio::test]
    async fn test_violations_are_listed_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(FixedClassifier::new(&["no_helmet"])));
        add_camera(State(state.clone()), Ok(Json(request("cam1", 554))))
            .await
            .unwrap();

        let db = state.supervisor.recorder().database().clone();
        assert!(wait_until(move || db.count_violations(None).unwrap() >= 2).await);
        state.supervisor.shutdown().await;

        let Json(violations) = list_violations(
            State(state.clone()),
            Query(ViolationQuery {
                camera_id: Some("cam1".to_string()),
                limit: Some(1),
            }),
        )
        .await
        .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].camera_id, "cam1");
        assert_eq!(violations[0].violation_class, "no_helmet");

        let Json(none) = list_violations(
            State(state),
            Query(ViolationQuery {
                camera_id: Some("other".to_string()),
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Arc::new(DisabledClassifier::default()));
        let response = health(State(state)).await.into_response();
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["camerasRunning"], 0);
    }
}
