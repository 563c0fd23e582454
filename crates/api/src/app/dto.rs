use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pinqueue_core::{DispatchReport, PinId, QueueEntry, UserId};
use pinqueue_infra::StatusFilter;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPinRequest {
    pub user_id: String,
    pub board_id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub link: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Pin submission signed by an allow-listed browser extension.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPinRequest {
    pub extension_id: String,
    pub signature: String,
    #[serde(flatten)]
    pub pin: SubmitPinRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionStatusQuery {
    pub extension_id: String,
    pub user_id: String,
    pub pin_id: Option<String>,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCredentialRequest {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires; absent means no known expiry.
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub user_id: Option<String>,
    pub pin_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueQuery {
    pub user_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: DispatchReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPinResponse {
    pub success: bool,
    pub pin_id: PinId,
    pub scheduled_at: DateTime<Utc>,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinView {
    pub id: PinId,
    pub board_id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub link: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub posted: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub state: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<QueueEntry> for PinView {
    fn from(entry: QueueEntry) -> Self {
        Self {
            state: entry.status_label(),
            posted: entry.posted(),
            id: entry.id,
            board_id: entry.board_id,
            title: entry.title,
            description: entry.description,
            image_url: entry.image_url,
            link: entry.link,
            scheduled_at: entry.scheduled_at,
            posted_at: entry.posted_at,
            error_message: entry.error_message,
            retry_count: entry.retry_count,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PinsResponse {
    pub success: bool,
    pub pins: Vec<PinView>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            pages: total.div_ceil(u64::from(limit.max(1))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub success: bool,
    pub pins: Vec<PinView>,
    pub pagination: Pagination,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn require_user_id(raw: Option<&str>) -> Result<UserId, axum::response::Response> {
    let raw = raw.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
        errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "missing_user_id",
            "userId is required",
        )
    })?;
    raw.trim()
        .parse::<UserId>()
        .map_err(errors::domain_error_to_response)
}

pub fn parse_pin_id(raw: &str) -> Result<PinId, axum::response::Response> {
    raw.trim()
        .parse::<PinId>()
        .map_err(errors::domain_error_to_response)
}

pub fn parse_status_filter(raw: Option<&str>) -> Result<StatusFilter, axum::response::Response> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("all") => Ok(StatusFilter::All),
        Some("pending") => Ok(StatusFilter::Pending),
        Some("posted") => Ok(StatusFilter::Posted),
        Some(_) => Err(errors::json_error(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: all, pending, posted",
        )),
    }
}
