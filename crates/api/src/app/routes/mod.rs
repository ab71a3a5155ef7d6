use axum::{routing::get, Router};

pub mod common;
pub mod history;
pub mod movements;
pub mod system;
pub mod wallets;

/// Every ledger endpoint plus the operational ones.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .merge(wallets::router())
        .merge(movements::router())
        .merge(history::router())
}
