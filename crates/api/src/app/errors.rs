use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use wallets_core::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LedgerError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        LedgerError::AlreadyExists(msg) => json_error(StatusCode::CONFLICT, "already_exists", msg),
        LedgerError::InsufficientBalance(msg) => {
            json_error(StatusCode::PAYMENT_REQUIRED, "insufficient_balance", msg)
        }
        LedgerError::Internal(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
