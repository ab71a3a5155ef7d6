use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::Response;

use crate::app::errors::json_error;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Client-supplied idempotency key for a mutating request.
///
/// Absence is not rejected here; the coordinator decides, so every mutating
/// route reports a missing key the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdempotencyKey(Option<String>);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(IDEMPOTENCY_KEY_HEADER) {
            None => Ok(Self(None)),
            Some(value) => value
                .to_str()
                .map(|key| Self(Some(key.to_string())))
                .map_err(|_| {
                    json_error(
                        StatusCode::BAD_REQUEST,
                        "validation_error",
                        "`Idempotency-Key` must be visible ASCII",
                    )
                }),
        }
    }
}
