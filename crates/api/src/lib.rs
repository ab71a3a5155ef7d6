//! HTTP API for the wallet ledger: configuration, routing, request parsing
//! and process lifecycle.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
pub mod shutdown;
