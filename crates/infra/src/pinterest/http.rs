//! `reqwest` adapter for the Pinterest v5 API.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use pinqueue_core::TokenGrant;

use super::{CreatePinRequest, CreatedPin, PinterestApi, PinterestError};
use crate::config::PinterestConfig;

#[derive(Debug, Clone)]
pub struct HttpPinterestClient {
    client: Client,
    config: PinterestConfig,
}

impl HttpPinterestClient {
    pub fn new(config: PinterestConfig) -> Result<Self, PinterestError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PinterestError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PinterestError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, error_message(&body, status)))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Prefer the API's `message` field; fall back to the raw body, then the reason phrase.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(ErrorBody { message: Some(m) }) = serde_json::from_str::<ErrorBody>(body) {
        return m;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.chars().take(500).collect();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

fn map_status(status: StatusCode, message: String) -> PinterestError {
    match status.as_u16() {
        401 | 403 => PinterestError::Unauthorized(message),
        429 => PinterestError::RateLimited,
        400 | 404 | 409 | 422 => PinterestError::Rejected {
            status: status.as_u16(),
            message,
        },
        other => PinterestError::Upstream {
            status: other,
            message,
        },
    }
}

fn map_transport_error(err: reqwest::Error) -> PinterestError {
    if err.is_timeout() {
        PinterestError::Timeout
    } else {
        PinterestError::Network(err.to_string())
    }
}

#[async_trait::async_trait]
impl PinterestApi for HttpPinterestClient {
    async fn create_pin(
        &self,
        access_token: &str,
        request: &CreatePinRequest,
    ) -> Result<CreatedPin, PinterestError> {
        let response = self
            .send(
                self.client
                    .post(self.url("pins"))
                    .bearer_auth(access_token)
                    .json(request),
            )
            .await?;
        let created: CreatedPin = response
            .json()
            .await
            .map_err(|e| PinterestError::Decode(e.to_string()))?;
        debug!(pin_id = %created.id, board_id = %request.board_id, "pin created");
        Ok(created)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, PinterestError> {
        let mut request = self.client.post(self.url("oauth/token")).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);
        if let Some(client_id) = &self.config.client_id {
            request = request.basic_auth(client_id, self.config.client_secret.as_ref());
        }
        let response = self.send(request).await?;
        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| PinterestError::Decode(e.to_string()))
    }
}
