//! HTTP API: dandanplay-compatible routes over the aggregation engine.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;
pub mod wire;

pub use server::{AppState, serve};
