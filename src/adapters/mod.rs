//! Adapters - implementations of ports and the inbound transport.

pub mod ai;
pub mod http;
pub mod rpc;
