//! Per-user publishing credentials.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use pinqueue_core::{Credential, UserId};

use crate::queue::StoreError;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;

/// Credential store abstraction.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<Credential>, StoreError>;

    /// Insert or replace the credential for `credential.user_id`.
    async fn upsert(&self, credential: Credential) -> Result<(), StoreError>;

    /// Persist tokens obtained from a refresh.
    ///
    /// A `None` refresh token keeps the stored one.
    async fn update_tokens(
        &self,
        user_id: UserId,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn get(&self, user_id: UserId) -> Result<Option<Credential>, StoreError> {
        (**self).get(user_id).await
    }

    async fn upsert(&self, credential: Credential) -> Result<(), StoreError> {
        (**self).upsert(credential).await
    }

    async fn update_tokens(
        &self,
        user_id: UserId,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        (**self)
            .update_tokens(user_id, access_token, expires_at, refresh_token)
            .await
    }
}
