//! In-memory credential store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use pinqueue_core::{Credential, UserId};

use super::CredentialStore;
use crate::queue::StoreError;

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<UserId, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("credential lock poisoned".to_string())
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, user_id: UserId) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.read().map_err(poisoned)?.get(&user_id).cloned())
    }

    async fn upsert(&self, credential: Credential) -> Result<(), StoreError> {
        self.credentials
            .write()
            .map_err(poisoned)?
            .insert(credential.user_id, credential);
        Ok(())
    }

    async fn update_tokens(
        &self,
        user_id: UserId,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut credentials = self.credentials.write().map_err(poisoned)?;
        let credential = credentials
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("credential for user {user_id}")))?;
        credential.access_token = access_token.to_string();
        credential.expires_at = Some(expires_at);
        if let Some(rt) = refresh_token {
            credential.refresh_token = Some(rt.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn update_tokens_keeps_refresh_token_when_not_rotated() {
        let store = InMemoryCredentialStore::new();
        let user = UserId::new();
        store
            .upsert(Credential {
                user_id: user,
                access_token: "old".to_string(),
                refresh_token: Some("rt".to_string()),
                expires_at: None,
            })
            .await
            .unwrap();

        let expires = Utc::now() + Duration::days(30);
        store.update_tokens(user, "new", expires, None).await.unwrap();

        let stored = store.get(user).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "new");
        assert_eq!(stored.refresh_token.as_deref(), Some("rt"));
        assert_eq!(stored.expires_at, Some(expires));
    }

    #[tokio::test]
    async fn update_tokens_requires_existing_credential() {
        let store = InMemoryCredentialStore::new();
        let result = store
            .update_tokens(UserId::new(), "at", Utc::now(), None)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
