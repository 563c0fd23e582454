//! Postgres-backed credential store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use pinqueue_core::{Credential, UserId};

use super::CredentialStore;
use crate::queue::StoreError;
use crate::queue::postgres::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self), err)]
    async fn get(&self, user_id: UserId) -> Result<Option<Credential>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, access_token, refresh_token, expires_at
            FROM pin_credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_credential", e))?;

        row.map(|row| -> Result<Credential, sqlx::Error> {
            Ok(Credential {
                user_id: UserId::from_uuid(row.try_get("user_id")?),
                access_token: row.try_get("access_token")?,
                refresh_token: row.try_get("refresh_token")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
        .map_err(|e| StoreError::Storage(format!("failed to decode credential row: {e}")))
    }

    #[instrument(skip(self, credential), fields(user_id = %credential.user_id), err)]
    async fn upsert(&self, credential: Credential) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pin_credentials (user_id, access_token, refresh_token, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (user_id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            "#,
        )
        .bind(credential.user_id.as_uuid())
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_credential", e))?;
        Ok(())
    }

    #[instrument(skip(self, access_token, refresh_token), err)]
    async fn update_tokens(
        &self,
        user_id: UserId,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pin_credentials
            SET access_token = $2,
                expires_at = $3,
                refresh_token = COALESCE($4, refresh_token),
                updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(access_token)
        .bind(expires_at)
        .bind(refresh_token)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_tokens", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("credential for user {user_id}")));
        }
        Ok(())
    }
}
