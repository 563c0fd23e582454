//! Pin submissions and their validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Maximum title length accepted by the publishing API.
pub const TITLE_MAX_CHARS: usize = 100;

/// Maximum description length accepted by the publishing API.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Where the image for a pin comes from.
///
/// Only URL-sourced images are supported; the tag matches the wire shape
/// `{ "source_type": "image_url", "url": "…" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum ImageSource {
    ImageUrl { url: String },
}

impl ImageSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::ImageUrl { url: url.into() }
    }
}

/// A pin submitted for scheduled publishing (not yet queued).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPin {
    pub user_id: UserId,
    pub board_id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub link: Option<String>,
    /// When absent the pin is due immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewPin {
    /// Check field bounds and URL shapes.
    pub fn validate(&self) -> DomainResult<()> {
        if self.board_id.trim().is_empty() {
            return Err(DomainError::validation("boardId must not be empty"));
        }
        check_len("title", &self.title, TITLE_MAX_CHARS)?;
        check_len("description", &self.description, DESCRIPTION_MAX_CHARS)?;
        check_url("imageUrl", &self.image_url)?;
        if let Some(link) = &self.link {
            check_url("link", link)?;
        }
        Ok(())
    }
}

fn check_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    let len = value.chars().count();
    if len == 0 {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if len > max {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max} characters (got {len})"
        )));
    }
    Ok(())
}

fn check_url(field: &str, value: &str) -> DomainResult<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| DomainError::validation(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        _ => Err(DomainError::validation(format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewPin {
        NewPin {
            user_id: UserId::new(),
            board_id: "board-1".to_string(),
            title: "Autumn palette".to_string(),
            description: "Warm colours for October".to_string(),
            image_url: "https://images.example.com/a.jpg".to_string(),
            link: Some("https://blog.example.com/autumn".to_string()),
            scheduled_at: None,
        }
    }

    #[test]
    fn accepts_well_formed_pin() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn title_bounds_are_enforced() {
        let mut pin = valid();
        pin.title = String::new();
        assert!(matches!(pin.validate(), Err(DomainError::Validation(_))));

        pin.title = "x".repeat(TITLE_MAX_CHARS);
        assert!(pin.validate().is_ok());

        pin.title = "x".repeat(TITLE_MAX_CHARS + 1);
        assert!(matches!(pin.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn description_counts_chars_not_bytes() {
        let mut pin = valid();
        pin.description = "é".repeat(DESCRIPTION_MAX_CHARS);
        assert!(pin.validate().is_ok());
    }

    #[test]
    fn rejects_non_http_image_url() {
        let mut pin = valid();
        pin.image_url = "ftp://files.example.com/a.jpg".to_string();
        assert!(pin.validate().is_err());

        pin.image_url = "not a url".to_string();
        assert!(pin.validate().is_err());
    }

    #[test]
    fn link_is_optional_but_checked_when_present() {
        let mut pin = valid();
        pin.link = None;
        assert!(pin.validate().is_ok());

        pin.link = Some("javascript:alert(1)".to_string());
        assert!(pin.validate().is_err());
    }

    #[test]
    fn image_source_wire_shape() {
        let json = serde_json::to_value(ImageSource::url("https://x.test/i.png")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "source_type": "image_url", "url": "https://x.test/i.png" })
        );
    }
}
