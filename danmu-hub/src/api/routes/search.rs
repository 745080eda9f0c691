//! Title search routes.

use axum::{Json, Router, extract::Query, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::models::{SearchQuery, SearchResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/anime", get(search_anime))
}

async fn search_anime(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let candidates = state.engine.search_title(&query.keyword).await?;
    Ok(Json(SearchResponse {
        animes: candidates.into_iter().map(Into::into).collect(),
    }))
}
