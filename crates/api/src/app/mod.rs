//! HTTP application wiring.
//!
//! - `services.rs`: backend selection and composition
//! - `routes/`: handlers, one file per resource
//! - `params.rs`: request parsing and validation messages
//! - `report.rs`: history renderers
//! - `dto.rs` / `errors.rs`: response shapes

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod params;
pub mod report;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices};

/// Build the full HTTP router around already-connected services.
pub fn build_app(services: AppServices) -> Router {
    let metrics = services.metrics.clone();
    let services = Arc::new(services);

    routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::track_response_time,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(middleware::make_request_span)),
        )
}
