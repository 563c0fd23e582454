use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use pinqueue_core::{Credential, NewPin, QueueEntry, expiry_after};
use pinqueue_infra::{CredentialStore, Page, QueueStore, StoreError};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn submit_pin(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubmitPinRequest>,
) -> axum::response::Response {
    enqueue(&services, body).await
}

/// Validate a submission and queue it for a user with a linked account.
pub(crate) async fn enqueue(
    services: &AppServices,
    body: dto::SubmitPinRequest,
) -> axum::response::Response {
    let user_id = match dto::require_user_id(Some(&body.user_id)) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let pin = NewPin {
        user_id,
        board_id: body.board_id,
        title: body.title,
        description: body.description,
        image_url: body.image_url,
        link: body.link.filter(|l| !l.trim().is_empty()),
        scheduled_at: body.scheduled_at,
    };
    if let Err(e) = pin.validate() {
        return errors::domain_error_to_response(e);
    }

    match services.credentials.get(user_id).await {
        Ok(Some(c)) if c.has_access_token() => {}
        Ok(_) => {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_connected",
                "no Pinterest account is connected for this user",
            );
        }
        Err(e) => return errors::store_error_to_response(e),
    }

    let entry = QueueEntry::new(pin, Utc::now());
    let scheduled_at = entry.scheduled_at;
    match services.queue.insert(entry).await {
        Ok(pin_id) => {
            tracing::info!(%pin_id, %user_id, %scheduled_at, "pin queued");
            (
                StatusCode::CREATED,
                Json(dto::SubmitPinResponse {
                    success: true,
                    pin_id,
                    scheduled_at,
                    message: "Pin scheduled successfully",
                }),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::StatusQuery>,
) -> axum::response::Response {
    pins_for(&services, query.user_id.as_deref(), query.pin_id.as_deref()).await
}

/// A user's pins (or one of them) as status views.
pub(crate) async fn pins_for(
    services: &AppServices,
    user_id: Option<&str>,
    pin_id: Option<&str>,
) -> axum::response::Response {
    let user_id = match dto::require_user_id(user_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let pin_id = match pin_id.filter(|s| !s.trim().is_empty()) {
        Some(raw) => match dto::parse_pin_id(raw) {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        },
        None => None,
    };

    match services.queue.status_for_user(user_id, pin_id).await {
        Ok(entries) => Json(dto::PinsResponse {
            success: true,
            pins: entries.into_iter().map(dto::PinView::from).collect(),
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn queue(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::QueueQuery>,
) -> axum::response::Response {
    let user_id = match dto::require_user_id(query.user_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let filter = match dto::parse_status_filter(query.status.as_deref()) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let page = Page::new(query.page.unwrap_or(1), query.limit.unwrap_or(10));

    match services.queue.list_for_user(user_id, filter, page).await {
        Ok((entries, total)) => Json(dto::QueueResponse {
            success: true,
            pins: entries.into_iter().map(dto::PinView::from).collect(),
            pagination: dto::Pagination::new(page.page, page.limit, total),
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_pin(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::UserQuery>,
) -> axum::response::Response {
    let user_id = match dto::require_user_id(query.user_id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let pin_id = match dto::parse_pin_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.queue.delete(user_id, pin_id).await {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "Pin deleted successfully",
        }))
        .into_response(),
        Err(StoreError::Conflict(_)) => errors::json_error(
            StatusCode::BAD_REQUEST,
            "pin_posted",
            "cannot delete posted pin",
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Link (or relink) a user's Pinterest tokens obtained out of band.
pub async fn save_credentials(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SaveCredentialRequest>,
) -> axum::response::Response {
    let user_id = match dto::require_user_id(Some(&body.user_id)) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if body.access_token.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "accessToken must not be empty",
        );
    }
    if body.expires_in.is_some_and(|secs| secs <= 0) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "expiresIn must be positive",
        );
    }

    let expires_at = match body
        .expires_in
        .map(|secs| expiry_after(Utc::now(), secs))
        .transpose()
    {
        Ok(at) => at,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let credential = Credential {
        user_id,
        access_token: body.access_token,
        refresh_token: body.refresh_token.filter(|t| !t.trim().is_empty()),
        expires_at,
    };
    match services.credentials.upsert(credential).await {
        Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
