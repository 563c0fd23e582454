use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::app::errors::json_error;
use crate::signature::secrets_match;

/// Shared bearer secret guarding one group of routes.
#[derive(Clone)]
pub struct BearerAuth {
    /// Names the guarded surface in logs and error messages ("cron", "admin").
    pub scope: &'static str,
    pub secret: Arc<str>,
}

impl BearerAuth {
    pub fn new(scope: &'static str, secret: impl Into<String>) -> Self {
        Self {
            scope,
            secret: Arc::from(secret.into()),
        }
    }
}

pub async fn bearer_auth_middleware(
    State(state): State<BearerAuth>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .map_err(|status| json_error(status, "unauthorized", "missing bearer token"))?;

    if !secrets_match(&state.secret, token) {
        tracing::warn!(scope = state.scope, "request rejected: bad bearer secret");
        return Err(json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            format!("invalid {} secret", state.scope),
        ));
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(extract_bearer(&headers), Ok("s3cret"));
    }
}
