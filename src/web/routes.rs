use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::{handlers, AppState};

/// API routes plus static serving of evidence images under `images_prefix`
pub fn build_router(state: Arc<AppState>, images_prefix: &str, permissive_cors: bool) -> Router {
    let images_dir = state.supervisor.recorder().images_dir().to_path_buf();
    let images_prefix = match images_prefix.trim_end_matches('/') {
        "" => "/violations".to_string(),
        prefix if prefix.starts_with('/') => prefix.to_string(),
        prefix => format!("/{prefix}"),
    };

    let api = Router::new()
        .route(
            "/cameras",
            get(handlers::list_cameras).post(handlers::add_camera),
        )
        .route(
            "/cameras/:id",
            put(handlers::update_camera).delete(handlers::delete_camera),
        )
        .route("/cameras/:id/status", get(handlers::camera_status))
        .route("/stream/:id", get(handlers::stream))
        .route("/violations", get(handlers::list_violations));

    let router = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .nest_service(&images_prefix, ServeDir::new(images_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
