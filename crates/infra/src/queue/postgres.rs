//! Postgres-backed queue store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check constraint violation) | `23514` | `Conflict` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed | N/A | `Storage` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Storage` |
//!
//! Outcome writes (`mark_posted`, `record_failure`, `delete`) are single
//! conditional statements. When no row matches, a follow-up lookup decides
//! between `NotFound` and `Conflict`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument};

use pinqueue_core::{PinId, PinState, QueueEntry, UserId};

use super::{Page, QueueStore, StatusFilter, StoreError};

#[derive(Debug, Clone)]
pub struct PostgresQueueStore {
    pool: Arc<PgPool>,
}

impl PostgresQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Explain why a conditional write on `id` matched no row.
    async fn missed_write(&self, operation: &str, id: PinId) -> StoreError {
        let row = sqlx::query("SELECT state, retry_count FROM pin_queue WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await;
        match row {
            Ok(Some(row)) => {
                let state: String = row.try_get("state").unwrap_or_default();
                let retry_count: i32 = row.try_get("retry_count").unwrap_or_default();
                StoreError::Conflict(format!(
                    "{operation}: pin {id} is {state} with retry_count {retry_count}"
                ))
            }
            Ok(None) => StoreError::NotFound(format!("pin {id}")),
            Err(e) => map_sqlx_error(operation, e),
        }
    }
}

const ENTRY_COLUMNS: &str = "id, user_id, board_id, title, description, image_url, link, \
     scheduled_at, state, posted_at, error_message, retry_count, created_at, updated_at";

fn filter_clause(filter: StatusFilter) -> &'static str {
    match filter {
        StatusFilter::All => "",
        StatusFilter::Pending => "AND state <> 'posted'",
        StatusFilter::Posted => "AND state = 'posted'",
    }
}

fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<QueueEntry>, StoreError> {
    rows.iter()
        .map(|row| {
            QueueEntryRow::from_row(row)
                .map_err(|e| StoreError::Storage(format!("failed to decode pin row: {e}")))
                .and_then(QueueEntry::try_from)
        })
        .collect()
}

#[async_trait::async_trait]
impl QueueStore for PostgresQueueStore {
    #[instrument(skip(self, entry), fields(pin_id = %entry.id), err)]
    async fn insert(&self, entry: QueueEntry) -> Result<PinId, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pin_queue (
                id, user_id, board_id, title, description, image_url, link,
                scheduled_at, state, posted_at, error_message, retry_count,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(&entry.board_id)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(&entry.image_url)
        .bind(&entry.link)
        .bind(entry.scheduled_at)
        .bind(entry.state.as_str())
        .bind(entry.posted_at)
        .bind(&entry.error_message)
        .bind(entry.retry_count as i32)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;
        Ok(entry.id)
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: PinId) -> Result<Option<QueueEntry>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM pin_queue WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        Ok(decode_rows(row.into_iter().collect())?.pop())
    }

    #[instrument(skip(self), fields(selected = tracing::field::Empty), err)]
    async fn select_due(
        &self,
        now: DateTime<Utc>,
        max_retries: u32,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM pin_queue
            WHERE state = 'pending'
              AND scheduled_at <= $1
              AND retry_count < $2
            ORDER BY scheduled_at ASC, created_at ASC, id ASC
            LIMIT $3
            "#
        ))
        .bind(now)
        .bind(max_retries as i32)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_due", e))?;

        let entries = decode_rows(rows)?;
        Span::current().record("selected", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self), err)]
    async fn mark_posted(&self, id: PinId, posted_at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pin_queue
            SET state = 'posted', posted_at = $2, error_message = NULL, updated_at = $2
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(posted_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_posted", e))?;

        if result.rows_affected() == 0 {
            return Err(self.missed_write("mark_posted", id).await);
        }
        Ok(())
    }

    #[instrument(skip(self, error_message), err)]
    async fn record_failure(
        &self,
        id: PinId,
        new_retry_count: u32,
        error_message: &str,
        state: PinState,
        failed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if state == PinState::Posted {
            return Err(StoreError::Conflict(
                "a failure cannot move a pin to posted".to_string(),
            ));
        }
        let result = sqlx::query(
            r#"
            UPDATE pin_queue
            SET retry_count = $2, error_message = $3, state = $4, updated_at = $5
            WHERE id = $1 AND state = 'pending' AND retry_count = $2 - 1
            "#,
        )
        .bind(id.as_uuid())
        .bind(new_retry_count as i32)
        .bind(error_message)
        .bind(state.as_str())
        .bind(failed_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_failure", e))?;

        if result.rows_affected() == 0 {
            return Err(self.missed_write("record_failure", id).await);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: StatusFilter,
        page: Page,
    ) -> Result<(Vec<QueueEntry>, u64), StoreError> {
        let clause = filter_clause(filter);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM pin_queue
            WHERE user_id = $1 {clause}
            ORDER BY scheduled_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_user", e))?;

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM pin_queue WHERE user_id = $1 {clause}"
        ))
        .bind(user_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("list_for_user", e))?;

        Ok((decode_rows(rows)?, total.max(0) as u64))
    }

    #[instrument(skip(self), err)]
    async fn status_for_user(
        &self,
        user_id: UserId,
        pin_id: Option<PinId>,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM pin_queue
            WHERE user_id = $1 AND ($2::uuid IS NULL OR id = $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(pin_id.map(|id| *id.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("status_for_user", e))?;
        decode_rows(rows)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, user_id: UserId, id: PinId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM pin_queue WHERE id = $1 AND user_id = $2 AND state <> 'posted'",
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            let owned = sqlx::query("SELECT state FROM pin_queue WHERE id = $1 AND user_id = $2")
                .bind(id.as_uuid())
                .bind(user_id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("delete", e))?;
            return Err(match owned {
                Some(_) => StoreError::Conflict(format!("pin {id} is already posted")),
                None => StoreError::NotFound(format!("pin {id}")),
            });
        }
        Ok(())
    }
}

/// Map SQLx errors to `StoreError`.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique / check constraint violation
                Some("23505") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        other => StoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}

struct QueueEntryRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    board_id: String,
    title: String,
    description: String,
    image_url: String,
    link: Option<String>,
    scheduled_at: DateTime<Utc>,
    state: String,
    posted_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for QueueEntryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(QueueEntryRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            board_id: row.try_get("board_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            link: row.try_get("link")?,
            scheduled_at: row.try_get("scheduled_at")?,
            state: row.try_get("state")?,
            posted_at: row.try_get("posted_at")?,
            error_message: row.try_get("error_message")?,
            retry_count: row.try_get("retry_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<QueueEntryRow> for QueueEntry {
    type Error = StoreError;

    fn try_from(row: QueueEntryRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<PinState>()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(QueueEntry {
            id: PinId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            board_id: row.board_id,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            link: row.link,
            scheduled_at: row.scheduled_at,
            state,
            posted_at: row.posted_at,
            error_message: row.error_message,
            retry_count: u32::try_from(row.retry_count).unwrap_or(0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
