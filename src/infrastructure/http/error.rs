//! Maps [`AppError`] to an HTTP response. Body shape matches
//! [`super::response::ok`]'s envelope: every error is
//! `{"status":"error","message":...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ports::errors::AppError;

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
}

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(ErrorBody { status: "error", message })).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidInput(_) | Self::InvalidPattern(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateId(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transient(_) => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }
        error_response(status, &self.to_string())
    }
}
