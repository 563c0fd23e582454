use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::middleware::{BearerAuth, bearer_auth_middleware};

pub mod cron;
pub mod extension;
pub mod external;
pub mod system;

/// Endpoints used by other tools (browser extensions, scripts) to queue and inspect pins.
///
/// Linking credentials and deleting pins require the admin bearer secret.
pub fn external_router(admin: BearerAuth) -> Router {
    let guarded = Router::new()
        .route("/pins/:id", delete(external::delete_pin))
        .route("/credentials", put(external::save_credentials))
        .route_layer(axum::middleware::from_fn_with_state(
            admin,
            bearer_auth_middleware,
        ));

    Router::new()
        .route("/pins", post(external::submit_pin))
        .route("/status", get(external::status))
        .route("/queue", get(external::queue))
        .merge(guarded)
}

/// HMAC-signed endpoints for allow-listed browser extensions.
pub fn extension_router() -> Router {
    Router::new()
        .route("/pins", post(extension::submit_pin))
        .route("/status", get(extension::status))
}
