//! Automatic matching and manual disambiguation routes.

use axum::{Json, Router, extract::Query, extract::State, routing::get, routing::post};

use crate::api::error::ApiResult;
use crate::api::models::{MatchQuery, MatchResponse, SelectRequest};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(match_file))
        .route("/select", post(select))
}

async fn match_file(
    State(state): State<AppState>,
    Query(query): Query<MatchQuery>,
) -> ApiResult<Json<MatchResponse>> {
    let outcome = state.engine.match_query(&query.file_name).await?;

    let response = match outcome {
        Some(outcome) => MatchResponse {
            is_matched: outcome.episode.is_some(),
            anime: Some(outcome.candidate.into()),
            episode: outcome.episode.map(Into::into),
            alternatives: outcome.alternatives.into_iter().map(Into::into).collect(),
        },
        None => MatchResponse {
            is_matched: false,
            anime: None,
            episode: None,
            alternatives: Vec::new(),
        },
    };
    Ok(Json(response))
}

/// Remember a manual selection; it stays sticky for later automatic searches
/// of the same keyword.
async fn select(
    State(state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .engine
        .remember_selection(&request.keyword, request.anime_id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
