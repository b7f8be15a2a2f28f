//! HTTP adapter for the RPC endpoint.
//!
//! - `POST /rpc` - newline-delimited JSON requests and responses

pub mod handlers;
pub mod routes;

pub use handlers::{handle_rpc, RpcAppState, RpcLimits};
pub use routes::rpc_routes;
