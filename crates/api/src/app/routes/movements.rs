use std::sync::Arc;

use axum::{body::Bytes, extract::Extension, routing::post, Router};

use crate::app::routes::common::{execution_response, preflight};
use crate::app::services::AppServices;
use crate::app::{dto, errors, params};
use crate::context::IdempotencyKey;

pub fn router() -> Router {
    Router::new()
        .route("/deposit", post(deposit))
        .route("/transfer", post(transfer))
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    key: IdempotencyKey,
    body: Bytes,
) -> axum::response::Response {
    if let Some(response) = preflight(&services, &key).await {
        return response;
    }

    let params = match params::deposit(&body) {
        Ok(p) => p,
        Err(e) => return errors::ledger_error_to_response(e.into()),
    };

    let outcome = services
        .wallets
        .deposit(key.as_deref(), &params.wallet_name, params.amount)
        .await;
    execution_response(&services, outcome, |balance| {
        dto::balance_to_json(&params.wallet_name, balance)
    })
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    key: IdempotencyKey,
    body: Bytes,
) -> axum::response::Response {
    if let Some(response) = preflight(&services, &key).await {
        return response;
    }

    let params = match params::transfer(&body) {
        Ok(p) => p,
        Err(e) => return errors::ledger_error_to_response(e.into()),
    };

    let outcome = services
        .wallets
        .transfer(key.as_deref(), &params.from, &params.to, params.amount)
        .await;
    execution_response(&services, outcome, |receipt| dto::transfer_to_json(&receipt))
}
