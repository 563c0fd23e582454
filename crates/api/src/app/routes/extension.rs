use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
};

use crate::app::routes::external;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::signature::{self, ExtensionAuth, SignatureError};

pub async fn submit_pin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<ExtensionAuth>,
    Json(body): Json<dto::ExtensionPinRequest>,
) -> axum::response::Response {
    let pin = &body.pin;
    let payload = signature::submission_payload(
        &body.extension_id,
        &pin.user_id,
        &pin.board_id,
        &pin.title,
        &pin.image_url,
    );
    if let Err(e) = auth.verify(&body.extension_id, &payload, &body.signature) {
        return rejected(&body.extension_id, e);
    }
    external::enqueue(&services, body.pin).await
}

pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(auth): Extension<ExtensionAuth>,
    Query(query): Query<dto::ExtensionStatusQuery>,
) -> axum::response::Response {
    let pin_id = query.pin_id.as_deref().filter(|s| !s.is_empty());
    let payload = signature::status_payload(&query.extension_id, &query.user_id, pin_id);
    if let Err(e) = auth.verify(&query.extension_id, &payload, &query.signature) {
        return rejected(&query.extension_id, e);
    }
    external::pins_for(&services, Some(query.user_id.as_str()), pin_id).await
}

fn rejected(extension_id: &str, err: SignatureError) -> axum::response::Response {
    tracing::warn!(extension_id, error = %err, "extension request rejected");
    errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string())
}
