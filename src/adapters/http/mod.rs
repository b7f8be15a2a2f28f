//! HTTP adapters.
//!
//! - `POST /rpc` - NDJSON RPC endpoint (path is configurable)
//! - `GET /health` - liveness

pub mod health;
pub mod rpc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use health::health_routes;
pub use rpc::{rpc_routes, RpcAppState, RpcLimits};

/// Builds the complete application router.
pub fn router(state: RpcAppState, rpc_path: &str, cors: CorsLayer) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(rpc_routes(rpc_path).with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS policy for the given origins. `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}
