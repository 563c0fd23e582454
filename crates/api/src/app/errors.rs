use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pinqueue_core::DomainError;
use pinqueue_infra::{JobError, StoreError};

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

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Storage(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::AlreadyRunning => json_error(
            StatusCode::CONFLICT,
            "already_running",
            "a dispatch run is already in progress",
        ),
        JobError::Store(e) => {
            tracing::error!(error = %e, "dispatch run aborted");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "dispatch_failed",
                e.to_string(),
            )
        }
    }
}
