//! Axum routes for the RPC endpoint.

use axum::routing::post;
use axum::Router;

use super::handlers::{handle_rpc, RpcAppState};

/// Mounts the NDJSON endpoint at `path`.
pub fn rpc_routes(path: &str) -> Router<RpcAppState> {
    Router::new().route(path, post(handle_rpc))
}
