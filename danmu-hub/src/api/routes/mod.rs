//! API route modules.
//!
//! Organizes routes by resource type.

pub mod admin;
pub mod bangumi;
pub mod comment;
pub mod health;
pub mod matching;
pub mod search;

use std::net::SocketAddr;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v2/search", search::router())
        .nest("/api/v2/match", matching::router())
        .nest("/api/v2/bangumi", bangumi::router())
        .nest("/api/v2/comment", comment::router())
        .nest("/api/admin", admin::router())
        .nest("/health", health::router())
        .with_state(state)
}

/// Client identity for admission control: proxy headers first, then the
/// connection address.
pub fn client_id(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }
    connect_info
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(client_id(&headers, None), "203.0.113.7");
    }

    #[test]
    fn test_client_id_falls_back_to_connection() {
        let headers = HeaderMap::new();
        let addr = ConnectInfo("192.0.2.1:5000".parse().unwrap());
        assert_eq!(client_id(&headers, Some(&addr)), "192.0.2.1");
    }
}
