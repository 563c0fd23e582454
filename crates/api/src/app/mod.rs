//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, Pinterest client and dispatch job wiring
//! - `routes/`: HTTP handlers (cron trigger, external and extension endpoints, health)
//! - `dto.rs`: request/response DTOs and query parsing helpers
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use pinqueue_infra::Config;

use crate::middleware::{self, BearerAuth};
use crate::signature::{ExtensionAuth, SignatureError};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Secrets guarding the cron, admin and extension route groups.
#[derive(Clone)]
pub struct ApiAuth {
    pub cron: BearerAuth,
    pub admin: BearerAuth,
    pub extension: ExtensionAuth,
}

impl ApiAuth {
    pub fn from_config(config: &Config) -> Result<Self, SignatureError> {
        Ok(Self {
            cron: BearerAuth::new("cron", config.cron_secret.clone()),
            admin: BearerAuth::new("admin", config.admin_secret.clone()),
            extension: ExtensionAuth::new(
                config.extension.allowed_ids.clone(),
                &config.extension.secret,
            )?,
        })
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>, auth: ApiAuth) -> Router {
    // Only the scheduler may trigger dispatch runs.
    let cron = Router::new()
        .route("/post-pins", post(routes::cron::post_pins))
        .route_layer(axum::middleware::from_fn_with_state(
            auth.cron,
            middleware::bearer_auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/cron", cron)
        .nest("/external", routes::external_router(auth.admin))
        .nest("/chrome-extension", routes::extension_router())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(services))
                .layer(Extension(auth.extension)),
        )
}
