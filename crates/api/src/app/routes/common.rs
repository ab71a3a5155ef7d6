use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

use wallets_core::LedgerResult;
use wallets_infra::Execution;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::IdempotencyKey;

/// Answer a missing key or a retry of a completed key before the body is
/// read. `None` means the request should go on to parsing and execution.
pub async fn preflight(services: &AppServices, key: &IdempotencyKey) -> Option<axum::response::Response> {
    match services.wallets.is_completed(key.as_deref()).await {
        Ok(false) => None,
        Ok(true) => Some(execution_response::<()>(
            services,
            Ok(Execution::AlreadyCompleted),
            |_| Value::Null,
        )),
        Err(e) => Some(execution_response::<()>(services, Err(e), |_| Value::Null)),
    }
}

/// Map a coordinated mutation onto the wire: 200 with a body when it ran now,
/// 201 with no body when the key had already completed.
pub fn execution_response<T>(
    services: &AppServices,
    outcome: LedgerResult<Execution<T>>,
    render: impl FnOnce(T) -> Value,
) -> axum::response::Response {
    match outcome {
        Ok(Execution::Executed(value)) => {
            services.metrics.record_idempotent_outcome("executed");
            (StatusCode::OK, Json(render(value))).into_response()
        }
        Ok(Execution::AlreadyCompleted) => {
            services.metrics.record_idempotent_outcome("already_completed");
            StatusCode::CREATED.into_response()
        }
        Err(e) => {
            services.metrics.record_idempotent_outcome("failed");
            errors::ledger_error_to_response(e)
        }
    }
}
