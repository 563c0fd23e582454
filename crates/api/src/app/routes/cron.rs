use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Run one dispatch batch on behalf of the external scheduler.
pub async fn post_pins(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.job.run(Utc::now()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(dto::CronResponse {
                success: true,
                report,
            }),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}
