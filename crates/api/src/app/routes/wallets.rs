use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::routes::common::{execution_response, preflight};
use crate::app::services::AppServices;
use crate::app::{dto, errors, params};
use crate::context::IdempotencyKey;

pub fn router() -> Router {
    Router::new()
        .route("/wallet", post(create_wallet))
        .route("/wallet/:wallet_name", get(get_wallet))
}

pub async fn create_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    key: IdempotencyKey,
    body: Bytes,
) -> axum::response::Response {
    if let Some(response) = preflight(&services, &key).await {
        return response;
    }

    let params = match params::create_wallet(&body) {
        Ok(p) => p,
        Err(e) => return errors::ledger_error_to_response(e.into()),
    };

    let outcome = services
        .wallets
        .create_wallet(key.as_deref(), &params.wallet_name)
        .await;
    execution_response(&services, outcome, |wallet| dto::wallet_to_json(&wallet))
}

pub async fn get_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    Path(wallet_name): Path<String>,
) -> axum::response::Response {
    let name = match params::wallet_path(&wallet_name) {
        Ok(n) => n,
        Err(e) => return errors::ledger_error_to_response(e.into()),
    };

    match services.wallets.balance(&name).await {
        Ok(balance) => (StatusCode::OK, Json(dto::balance_to_json(&name, balance))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
