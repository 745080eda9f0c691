//! Comment track routes: bulk fetch, segment index, single segments.

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, Query, State, rejection::ExtensionRejection},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::api::error::ApiResult;
use crate::api::models::{CommentQuery, CommentResponse, SegmentIndexResponse, SegmentRequest};
use crate::api::routes::client_id;
use crate::api::server::AppState;
use crate::api::wire;
use crate::model::{CanonicalComment, CommentsOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{episode_ref}", get(comments))
        .route("/segment", post(segment))
}

fn render(comments: Vec<CanonicalComment>, format: Option<&str>) -> ApiResult<Response> {
    if format == Some("xml") {
        let body = wire::to_xml(&comments)?;
        return Ok((
            [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
            body,
        )
            .into_response());
    }
    Ok(Json(CommentResponse {
        count: comments.len(),
        comments,
    })
    .into_response())
}

/// `episode_ref` is a registered episode id, or a URL-encoded direct link.
async fn comments(
    State(state): State<AppState>,
    Path(episode_ref): Path<String>,
    Query(query): Query<CommentQuery>,
    headers: HeaderMap,
    connect_info: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
) -> ApiResult<Response> {
    let connect_info = connect_info.ok();
    let client = client_id(&headers, connect_info.as_ref());
    let outcome = state
        .engine
        .fetch_comments(
            &client,
            &episode_ref,
            query.segmented.unwrap_or(false),
            query.with_related.unwrap_or(false),
        )
        .await?;

    match outcome {
        CommentsOutcome::Full(comments) => render(comments, query.format.as_deref()),
        CommentsOutcome::Segmented(segments) => Ok(Json(SegmentIndexResponse {
            count: segments.len(),
            segments,
        })
        .into_response()),
    }
}

/// Fetch one segment slice for progressive playback. The body is a segment
/// exactly as handed out by the index response.
async fn segment(
    State(state): State<AppState>,
    Query(query): Query<CommentQuery>,
    headers: HeaderMap,
    connect_info: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    Json(request): Json<SegmentRequest>,
) -> ApiResult<Response> {
    let connect_info = connect_info.ok();
    let client = client_id(&headers, connect_info.as_ref());
    let comments = state.engine.fetch_segment(&client, &request.0).await?;
    render(comments, query.format.as_deref())
}
