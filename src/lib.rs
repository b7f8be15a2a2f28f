//! Cool Beans - coffee shop backend
//!
//! Serves a coffee inventory and an AI shopping assistant over a
//! newline-delimited JSON RPC protocol. Services keep their state in memory
//! for the life of the process.

pub mod adapters;
pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
