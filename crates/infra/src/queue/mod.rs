//! Pin queue persistence.
//!
//! ## Design
//!
//! - One row per queued pin; the row's `state` is the source of truth
//! - Outcome writes are conditional on the row still being `pending`, so a
//!   posted entry can never be rewritten or deleted
//! - `select_due` returns the oldest due entries first
//!
//! ## Components
//!
//! - `QueueStore`: persistence port used by the dispatch job and the HTTP surface
//! - `InMemoryQueueStore`: tests/dev
//! - `PostgresQueueStore`: durable storage via sqlx

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use pinqueue_core::{PinId, PinState, QueueEntry, UserId};

pub use in_memory::InMemoryQueueStore;
pub use postgres::PostgresQueueStore;

/// Storage error shared by the queue and credential stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Status filter for user-facing listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    /// Anything not yet published (including exhausted and failed entries).
    Pending,
    Posted,
}

impl StatusFilter {
    pub fn matches(self, entry: &QueueEntry) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => !entry.posted(),
            StatusFilter::Posted => entry.posted(),
        }
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp to `page >= 1` and `1 <= limit <= MAX_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Queue store abstraction.
#[async_trait::async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a new entry.
    async fn insert(&self, entry: QueueEntry) -> Result<PinId, StoreError>;

    /// Get an entry by ID.
    async fn get(&self, id: PinId) -> Result<Option<QueueEntry>, StoreError>;

    /// Pending entries with `scheduled_at <= now` and `retry_count < max_retries`,
    /// oldest `scheduled_at` first, at most `limit` of them.
    async fn select_due(
        &self,
        now: DateTime<Utc>,
        max_retries: u32,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, StoreError>;

    /// Record a successful publication.
    ///
    /// Fails with `Conflict` unless the entry is still pending.
    async fn mark_posted(&self, id: PinId, posted_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Record a failed attempt.
    ///
    /// Applies only if the entry is pending with `retry_count == new_retry_count - 1`,
    /// which keeps the increment at exactly one per attempt. `failed_at` becomes `updated_at`.
    async fn record_failure(
        &self,
        id: PinId,
        new_retry_count: u32,
        error_message: &str,
        state: PinState,
        failed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// A user's entries, newest `scheduled_at` first, plus the total count for the filter.
    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: StatusFilter,
        page: Page,
    ) -> Result<(Vec<QueueEntry>, u64), StoreError>;

    /// A user's entries (optionally a single one), newest `created_at` first.
    async fn status_for_user(
        &self,
        user_id: UserId,
        pin_id: Option<PinId>,
    ) -> Result<Vec<QueueEntry>, StoreError>;

    /// Delete an unposted entry owned by `user_id`.
    async fn delete(&self, user_id: UserId, id: PinId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<T: QueueStore + ?Sized> QueueStore for Arc<T> {
    async fn insert(&self, entry: QueueEntry) -> Result<PinId, StoreError> {
        (**self).insert(entry).await
    }

    async fn get(&self, id: PinId) -> Result<Option<QueueEntry>, StoreError> {
        (**self).get(id).await
    }

    async fn select_due(
        &self,
        now: DateTime<Utc>,
        max_retries: u32,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        (**self).select_due(now, max_retries, limit).await
    }

    async fn mark_posted(&self, id: PinId, posted_at: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).mark_posted(id, posted_at).await
    }

    async fn record_failure(
        &self,
        id: PinId,
        new_retry_count: u32,
        error_message: &str,
        state: PinState,
        failed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self)
            .record_failure(id, new_retry_count, error_message, state, failed_at)
            .await
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: StatusFilter,
        page: Page,
    ) -> Result<(Vec<QueueEntry>, u64), StoreError> {
        (**self).list_for_user(user_id, filter, page).await
    }

    async fn status_for_user(
        &self,
        user_id: UserId,
        pin_id: Option<PinId>,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        (**self).status_for_user(user_id, pin_id).await
    }

    async fn delete(&self, user_id: UserId, id: PinId) -> Result<(), StoreError> {
        (**self).delete(user_id, id).await
    }
}
