//! Gateway-wide error taxonomy.
//!
//! Every error surfaced to an HTTP caller is one of these kinds. Handlers map
//! `Validation`/`Auth*`/`CreditExhausted`/`SessionsExhausted` to bare HTTP
//! errors; everything else that happens inside an `OperationRunner` is caught
//! and converted to a failure envelope instead (see `operations::Envelope`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request validation failed: {0}")]
    Validation(String),

    #[error("missing or malformed Authorization header")]
    AuthRequired,

    #[error("invalid API key")]
    AuthInvalid,

    #[error("insufficient credit balance")]
    CreditExhausted,

    #[error("browser sessions exhausted: {reason}")]
    SessionsExhausted {
        reason: String,
        retry_after: Duration,
    },

    #[error("upstream transient failure: {0}")]
    UpstreamTransient(String),

    #[error("upstream fatal failure: {0}")]
    UpstreamFatal(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self {
            GatewayError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone(), None),
            GatewayError::AuthRequired | GatewayError::AuthInvalid => {
                (StatusCode::UNAUTHORIZED, self.to_string(), None)
            }
            GatewayError::CreditExhausted => {
                (StatusCode::PAYMENT_REQUIRED, self.to_string(), None)
            }
            GatewayError::SessionsExhausted { retry_after, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                self.to_string(),
                Some(*retry_after),
            ),
            GatewayError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), None),
            GatewayError::Conflict(_) => (StatusCode::CONFLICT, self.to_string(), None),
            GatewayError::UpstreamTransient(_) | GatewayError::UpstreamFatal(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string(), None)
            }
            GatewayError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    None,
                )
            }
        };

        let mut response = (
            status,
            axum::Json(ErrorBody {
                error: ErrorDetail { message },
            }),
        )
            .into_response();

        if let Some(retry_after) = retry_after {
            let header_value = retry_after.as_secs().max(1).to_string();
            if let Ok(value) = axum::http::HeaderValue::from_str(&header_value) {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
