//! Episode listing routes (manual browsing: never noise-filtered).

use axum::{Json, Router, extract::Path, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::BangumiResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{anime_id}", get(episodes))
}

async fn episodes(
    State(state): State<AppState>,
    Path(anime_id): Path<i64>,
) -> ApiResult<Json<BangumiResponse>> {
    let anime = state
        .engine
        .anime(anime_id)
        .ok_or_else(|| ApiError::not_found(format!("anime {anime_id} not registered")))?;
    let episodes = state.engine.resolve_episodes(anime_id).await?;

    Ok(Json(BangumiResponse {
        anime_id,
        anime_title: anime.title,
        episodes: episodes.into_iter().map(Into::into).collect(),
    }))
}
