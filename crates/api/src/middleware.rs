use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

use wallets_observability::Metrics;

/// Route label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Record request latency by route template and status code.
pub async fn track_response_time(
    State(metrics): State<Arc<Metrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let started = Instant::now();
    let response = next.run(req).await;

    metrics.observe_response(&route, response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

/// Root span for one HTTP request, tagged with a fresh time-ordered id.
pub fn make_request_span(req: &Request<Body>) -> Span {
    let request_id = Uuid::now_v7();
    tracing::info_span!(
        "http_request",
        %request_id,
        method = %req.method(),
        uri = %req.uri(),
    )
}
