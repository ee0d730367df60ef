use axum::{extract::DefaultBodyLimit, Json, Router};
use chrono::Utc;

use crate::exchange::routes as exchange_routes;
use crate::exchange::store;
use crate::state::AppState;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // The upload body is base64 JSON, so allow double the decoded cap.
    let upload_body_limit = state.max_upload_size_mb as usize * 1024 * 1024 * 2;

    let upload_routes = Router::new()
        .route("/api/upload", axum::routing::post(exchange_routes::upload))
        .layer(DefaultBodyLimit::max(upload_body_limit));

    let exchange = Router::new()
        .route(
            "/api/download/{file_id}",
            axum::routing::get(exchange_routes::download),
        )
        .route(
            "/api/download/{file_id}/content",
            axum::routing::get(exchange_routes::download_content),
        )
        .route("/api/files", axum::routing::get(exchange_routes::list_files))
        .route(
            "/api/files/{file_id}",
            axum::routing::delete(exchange_routes::delete_file),
        );

    // Health check (no auth)
    let health = Router::new().route("/api/health", axum::routing::get(health_check));

    Router::new()
        .merge(upload_routes)
        .merge(exchange)
        .merge(health)
        .with_state(state)
}

/// GET /api/health — liveness probe with the server's current clock.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": store::timestamp(Utc::now()),
    }))
}
