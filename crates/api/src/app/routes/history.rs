use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::app::services::AppServices;
use crate::app::{errors, params};

pub const NEXT_CURSOR_HEADER: HeaderName = HeaderName::from_static("x-next-cursor");

pub fn router() -> Router {
    Router::new().route("/history/:wallet_name", get(fetch_history))
}

/// Query: `start_date`, `end_date` (`YYYY-MM-DD`, inclusive), `direction`,
/// `offset_by_id`, `limit`, `format` (`csv` or `json`).
pub async fn fetch_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(wallet_name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let parsed = params::wallet_path(&wallet_name).and_then(|name| Ok((name, params::history(&query)?)));
    let (name, request) = match parsed {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e.into()),
    };

    let page = match services.wallets.fetch_history(&name, &request.filter).await {
        Ok(page) => page,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let writer = request.format.writer();
    let body = match writer.render(&page) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, wallet = %name, "failed to render history");
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error");
        }
    };

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(writer.content_type()))],
        body,
    )
        .into_response();
    if let Some(cursor) = page.next_cursor {
        response
            .headers_mut()
            .insert(NEXT_CURSOR_HEADER, HeaderValue::from(cursor));
    }
    response
}
