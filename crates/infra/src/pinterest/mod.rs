//! Publishing API port.
//!
//! `PinterestApi` is the seam the dispatch job talks through; `HttpPinterestClient`
//! is the production adapter, tests substitute scripted fakes.

pub mod http;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use pinqueue_core::{ImageSource, QueueEntry, TokenGrant};

pub use http::HttpPinterestClient;

/// Body of a create-pin call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePinRequest {
    pub board_id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub media_source: ImageSource,
}

impl From<&QueueEntry> for CreatePinRequest {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            board_id: entry.board_id.clone(),
            title: entry.title.clone(),
            description: entry.description.clone(),
            link: entry.link.clone(),
            media_source: entry.image_source(),
        }
    }
}

/// The part of a created pin we keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPin {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinterestError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited")]
    RateLimited,
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl PinterestError {
    /// Whether retrying the same request can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, PinterestError::Rejected { .. })
    }
}

#[async_trait::async_trait]
pub trait PinterestApi: Send + Sync {
    async fn create_pin(
        &self,
        access_token: &str,
        request: &CreatePinRequest,
    ) -> Result<CreatedPin, PinterestError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, PinterestError>;
}

#[async_trait::async_trait]
impl<T: PinterestApi + ?Sized> PinterestApi for Arc<T> {
    async fn create_pin(
        &self,
        access_token: &str,
        request: &CreatePinRequest,
    ) -> Result<CreatedPin, PinterestError> {
        (**self).create_pin(access_token, request).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, PinterestError> {
        (**self).refresh_token(refresh_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pinqueue_core::{NewPin, UserId};

    #[test]
    fn request_from_entry_matches_wire_shape() {
        let entry = QueueEntry::new(
            NewPin {
                user_id: UserId::new(),
                board_id: "b-9".to_string(),
                title: "Title".to_string(),
                description: "Desc".to_string(),
                image_url: "https://img.test/x.jpg".to_string(),
                link: None,
                scheduled_at: None,
            },
            Utc::now(),
        );
        let json = serde_json::to_value(CreatePinRequest::from(&entry)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "board_id": "b-9",
                "title": "Title",
                "description": "Desc",
                "media_source": { "source_type": "image_url", "url": "https://img.test/x.jpg" }
            })
        );
    }

    #[test]
    fn only_rejections_are_permanent() {
        assert!(PinterestError::Rejected { status: 400, message: "bad board".into() }.is_permanent());
        assert!(!PinterestError::Timeout.is_permanent());
        assert!(!PinterestError::RateLimited.is_permanent());
        assert!(!PinterestError::Unauthorized("expired".into()).is_permanent());
        assert!(!PinterestError::Upstream { status: 503, message: String::new() }.is_permanent());
    }
}
