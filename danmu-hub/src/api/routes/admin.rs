//! Administrative routes: cache and mirror clearing.

use axum::{Json, Router, extract::State, routing::delete};

use crate::api::error::ApiResult;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cache", delete(clear_cache))
        .route("/mirror", delete(clear_mirror))
}

async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.engine.clear_caches();
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn clear_mirror(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.engine.clear_durable_mirrors().await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
