//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::routes;
use crate::engine::DanmuEngine;
use crate::error::{Error, Result};

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DanmuEngine>,
}

/// Read-repair: before any API route runs, refresh in-memory registries from
/// the durable mirror so independent instances converge. Non-API paths
/// (health, assets) skip the round trip.
async fn read_repair(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.uri().path().starts_with("/api") {
        state.engine.sync_from_mirror().await;
    }
    next.run(request).await
}

/// Run the HTTP server until the cancellation token fires.
pub async fn serve(engine: Arc<DanmuEngine>, shutdown: CancellationToken) -> Result<()> {
    let server_config = engine.config().server.clone();
    let state = AppState { engine };

    let mut app = routes::create_router(state.clone())
        .layer(middleware::from_fn_with_state(state, read_repair))
        .layer(TraceLayer::new_for_http());

    if server_config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr: SocketAddr = format!("{}:{}", server_config.bind_address, server_config.port)
        .parse()
        .map_err(|e| Error::config(format!("bad bind address: {e}")))?;

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "danmu gateway listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    info!("server stopped");
    Ok(())
}
