//! In-memory queue store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use pinqueue_core::{PinId, PinState, QueueEntry, UserId};

use super::{Page, QueueStore, StatusFilter, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    entries: RwLock<HashMap<PinId, QueueEntry>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Snapshot of every stored entry, unordered.
    pub fn all(&self) -> Vec<QueueEntry> {
        self.entries
            .read()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<PinId, QueueEntry>>, StoreError> {
        self.entries
            .read()
            .map_err(|_| StoreError::Storage("queue lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<PinId, QueueEntry>>, StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Storage("queue lock poisoned".to_string()))
    }
}

fn pending_mut(
    entries: &mut HashMap<PinId, QueueEntry>,
    id: PinId,
) -> Result<&mut QueueEntry, StoreError> {
    let entry = entries
        .get_mut(&id)
        .ok_or_else(|| StoreError::NotFound(format!("pin {id}")))?;
    if entry.state != PinState::Pending {
        return Err(StoreError::Conflict(format!("pin {id} is {}", entry.state)));
    }
    Ok(entry)
}

#[async_trait::async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn insert(&self, entry: QueueEntry) -> Result<PinId, StoreError> {
        let mut entries = self.write()?;
        if entries.contains_key(&entry.id) {
            return Err(StoreError::Conflict(format!("pin {} already exists", entry.id)));
        }
        let id = entry.id;
        entries.insert(id, entry);
        Ok(id)
    }

    async fn get(&self, id: PinId) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn select_due(
        &self,
        now: DateTime<Utc>,
        max_retries: u32,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let entries = self.read()?;
        let mut due: Vec<QueueEntry> = entries
            .values()
            .filter(|e| e.is_due(now, max_retries))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_posted(&self, id: PinId, posted_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut entries = self.write()?;
        let entry = pending_mut(&mut entries, id)?;
        entry.state = PinState::Posted;
        entry.posted_at = Some(posted_at);
        entry.error_message = None;
        entry.updated_at = posted_at;
        Ok(())
    }

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
        let mut entries = self.write()?;
        let entry = pending_mut(&mut entries, id)?;
        if entry.retry_count + 1 != new_retry_count {
            return Err(StoreError::Conflict(format!(
                "pin {id} retry_count is {}, expected {}",
                entry.retry_count,
                new_retry_count.saturating_sub(1)
            )));
        }
        entry.retry_count = new_retry_count;
        entry.error_message = Some(error_message.to_string());
        entry.state = state;
        entry.updated_at = failed_at;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: StatusFilter,
        page: Page,
    ) -> Result<(Vec<QueueEntry>, u64), StoreError> {
        let entries = self.read()?;
        let mut matching: Vec<QueueEntry> = entries
            .values()
            .filter(|e| e.user_id == user_id && filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn status_for_user(
        &self,
        user_id: UserId,
        pin_id: Option<PinId>,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let entries = self.read()?;
        let mut matching: Vec<QueueEntry> = entries
            .values()
            .filter(|e| e.user_id == user_id && pin_id.is_none_or(|id| e.id == id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching)
    }

    async fn delete(&self, user_id: UserId, id: PinId) -> Result<(), StoreError> {
        let mut entries = self.write()?;
        match entries.get(&id) {
            Some(entry) if entry.user_id == user_id => {
                if entry.posted() {
                    return Err(StoreError::Conflict(format!("pin {id} is already posted")));
                }
            }
            _ => return Err(StoreError::NotFound(format!("pin {id}"))),
        }
        entries.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pinqueue_core::NewPin;
    use proptest::prelude::*;

    fn entry_at(user_id: UserId, scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> QueueEntry {
        QueueEntry::new(
            NewPin {
                user_id,
                board_id: "board".to_string(),
                title: "title".to_string(),
                description: "description".to_string(),
                image_url: "https://img.test/a.png".to_string(),
                link: None,
                scheduled_at: Some(scheduled_at),
            },
            now,
        )
    }

    #[tokio::test]
    async fn select_due_skips_future_and_exhausted_entries() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        let user = UserId::new();

        let due = entry_at(user, now - Duration::minutes(5), now);
        let future = entry_at(user, now + Duration::minutes(5), now);
        let mut spent = entry_at(user, now - Duration::minutes(10), now);
        spent.retry_count = 3;

        let due_id = store.insert(due).await.unwrap();
        store.insert(future).await.unwrap();
        store.insert(spent).await.unwrap();

        let selected = store.select_due(now, 3, 10).await.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, due_id);
    }

    #[tokio::test]
    async fn record_failure_is_compare_and_set() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        let id = store
            .insert(entry_at(UserId::new(), now, now))
            .await
            .unwrap();

        let failed_at = now + Duration::minutes(1);
        store
            .record_failure(id, 1, "timeout", PinState::Pending, failed_at)
            .await
            .unwrap();
        // Replaying the same outcome must not double count.
        assert!(matches!(
            store.record_failure(id, 1, "timeout", PinState::Pending, failed_at).await,
            Err(StoreError::Conflict(_))
        ));
        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.updated_at, failed_at);
    }

    #[tokio::test]
    async fn posted_entries_are_immutable() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        let user = UserId::new();
        let id = store.insert(entry_at(user, now, now)).await.unwrap();

        store.mark_posted(id, now).await.unwrap();
        assert!(matches!(store.mark_posted(id, now).await, Err(StoreError::Conflict(_))));
        assert!(matches!(
            store.record_failure(id, 1, "late", PinState::Pending, now).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(store.delete(user, id).await, Err(StoreError::Conflict(_))));

        let stored = store.get(id).await.unwrap().unwrap();
        assert!(stored.posted());
        assert_eq!(stored.posted_at, Some(now));
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        let owner = UserId::new();
        let id = store.insert(entry_at(owner, now, now)).await.unwrap();

        assert!(matches!(
            store.delete(UserId::new(), id).await,
            Err(StoreError::NotFound(_))
        ));
        store.delete(owner, id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_for_user_pages_newest_first() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        let user = UserId::new();
        for i in 0..5 {
            store
                .insert(entry_at(user, now + Duration::hours(i), now))
                .await
                .unwrap();
        }
        store
            .insert(entry_at(UserId::new(), now, now))
            .await
            .unwrap();

        let (first, total) = store
            .list_for_user(user, StatusFilter::All, Page::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(first.len(), 2);
        assert!(first[0].scheduled_at > first[1].scheduled_at);

        let (last, _) = store
            .list_for_user(user, StatusFilter::All, Page::new(3, 2))
            .await
            .unwrap();
        assert_eq!(last.len(), 1);

        let (posted, total) = store
            .list_for_user(user, StatusFilter::Posted, Page::default())
            .await
            .unwrap();
        assert!(posted.is_empty());
        assert_eq!(total, 0);
    }

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(f)
    }

    proptest! {
        #[test]
        fn select_due_respects_limit_order_and_eligibility(
            offsets in proptest::collection::vec(-120i64..120, 0..40),
            retries in proptest::collection::vec(0u32..5, 40),
            limit in 1usize..15,
        ) {
            let now = Utc::now();
            let store = InMemoryQueueStore::new();
            let user = UserId::new();
            block_on(async {
                for (i, offset) in offsets.iter().enumerate() {
                    let mut e = entry_at(user, now + Duration::minutes(*offset), now);
                    e.retry_count = retries[i];
                    store.insert(e).await.unwrap();
                }
            });

            let selected = block_on(store.select_due(now, 3, limit)).unwrap();
            let eligible = store.all().iter().filter(|e| e.is_due(now, 3)).count();

            prop_assert_eq!(selected.len(), eligible.min(limit));
            prop_assert!(selected.iter().all(|e| e.scheduled_at <= now && e.retry_count < 3));
            prop_assert!(selected.windows(2).all(|w| w[0].scheduled_at <= w[1].scheduled_at));
        }
    }
}
