use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::auth::dto::Envelope;

/// Failure taxonomy surfaced by the use-cases and the HTTP boundary.
///
/// `Validation`, `Conflict`, `NotFound` and `Auth` carry user-correctable
/// messages that are echoed verbatim in the response body. `Unauthorized`
/// and `Forbidden` cover the bearer-token path. `Storage`, `Delivery` and
/// `Internal` are logged server-side and answered with a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Auth(String),

    #[error("Unauthorized Access")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("internal storage error")]
    Storage(#[source] anyhow::Error),

    #[error("failed to send OTP email")]
    Delivery(#[source] anyhow::Error),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Envelope convention: code 1 = unauthorized, 2 = application error.
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, 2),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, 2),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, 2),
            ApiError::Auth(_) => (StatusCode::UNAUTHORIZED, 2),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, 1),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, 1),
            ApiError::Storage(e) => {
                error!(error = %e, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, 2)
            }
            ApiError::Delivery(e) => {
                error!(error = %e, "mail delivery failure");
                (StatusCode::INTERNAL_SERVER_ERROR, 2)
            }
            ApiError::Internal(e) => {
                error!(error = %e, "unexpected failure");
                (StatusCode::INTERNAL_SERVER_ERROR, 2)
            }
        };

        (status, Json(Envelope::failure(code, self.to_string()))).into_response()
    }
}
