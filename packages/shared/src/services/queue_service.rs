use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::queue::{Preferences, QueuePosition, QueueStatus, WaitQueueEntry};
use crate::repositories::conversation_repository::{ConversationFilter, ConversationRepository};
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;
use crate::repositories::queue_repository::{QueueFilter, QueueRepository};
use crate::services::errors::queue_service_errors::QueueServiceError;
use crate::services::locks::KeyedLocks;

/// The wait queue. Writes for a user run under that user's lock.
pub struct QueueService {
    queue_repository: Arc<dyn QueueRepository + Send + Sync>,
    conversation_repository: Arc<dyn ConversationRepository + Send + Sync>,
    locks: Arc<KeyedLocks>,
    staleness_window: TimeDelta,
}

impl QueueService {
    pub fn new(
        queue_repository: Arc<dyn QueueRepository + Send + Sync>,
        conversation_repository: Arc<dyn ConversationRepository + Send + Sync>,
        locks: Arc<KeyedLocks>,
        staleness_window: TimeDelta,
    ) -> Self {
        QueueService {
            queue_repository,
            conversation_repository,
            locks,
            staleness_window,
        }
    }

    pub fn staleness_window(&self) -> TimeDelta {
        self.staleness_window
    }

    pub async fn enqueue(
        &self,
        user_id: &str,
        preferences: Preferences,
    ) -> Result<WaitQueueEntry, QueueServiceError> {
        if user_id.trim().is_empty() {
            return Err(QueueServiceError::InvalidInput(
                "User ID cannot be empty".to_string(),
            ));
        }
        if !preferences.age_range.is_valid() {
            return Err(QueueServiceError::InvalidInput(format!(
                "Age range {}-{} is empty",
                preferences.age_range.min, preferences.age_range.max
            )));
        }

        let _guard = self.locks.lock(&KeyedLocks::user_key(user_id)).await;

        let open = self
            .conversation_repository
            .scan_conversations(ConversationFilter::OpenFor(user_id.to_string()))
            .await?;
        if !open.is_empty() {
            return Err(QueueServiceError::AlreadyInConversation);
        }

        if self.queue_repository.get_entry(user_id).await?.is_some() {
            return Err(QueueServiceError::AlreadyQueued);
        }

        let entry = WaitQueueEntry::new(user_id, preferences);
        self.queue_repository
            .create_entry(&entry)
            .await
            .map_err(|e| match e {
                QueueRepositoryError::AlreadyExists => QueueServiceError::AlreadyQueued,
                other => QueueServiceError::from(other),
            })?;

        info!(user_id = %user_id, "User joined the wait queue");
        Ok(entry)
    }

    /// Removes the user's entry, returning it marked cancelled. No-op when not queued.
    pub async fn dequeue(
        &self,
        user_id: &str,
    ) -> Result<Option<WaitQueueEntry>, QueueServiceError> {
        let _guard = self.locks.lock(&KeyedLocks::user_key(user_id)).await;

        let Some(mut entry) = self.queue_repository.get_entry(user_id).await? else {
            return Ok(None);
        };
        if !self.queue_repository.delete_entry(user_id).await? {
            return Ok(None);
        }
        if entry.mark_cancelled().is_err() {
            debug!(user_id = %user_id, status = %entry.status, "Removed a non-waiting entry");
        }

        info!(user_id = %user_id, "User left the wait queue");
        Ok(Some(entry))
    }

    /// Refreshes `last_activity_at`. Returns `false` when the user is not queued.
    pub async fn touch(&self, user_id: &str) -> Result<bool, QueueServiceError> {
        let _guard = self.locks.lock(&KeyedLocks::user_key(user_id)).await;

        let Some(mut entry) = self.queue_repository.get_entry(user_id).await? else {
            return Ok(false);
        };
        entry.touch(Utc::now());

        match self.queue_repository.update_entry(&entry).await {
            Ok(()) => Ok(true),
            Err(QueueRepositoryError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<WaitQueueEntry>, QueueServiceError> {
        Ok(self.queue_repository.get_entry(user_id).await?)
    }

    /// Waiting entries, oldest first. Ties on `joined_at` fall back to `user_id`.
    pub async fn list_waiting(&self) -> Result<Vec<WaitQueueEntry>, QueueServiceError> {
        let mut entries = self
            .queue_repository
            .scan_entries(QueueFilter::Status(QueueStatus::Waiting))
            .await?;
        entries.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        debug!("Listed {} waiting entries", entries.len());
        Ok(entries)
    }

    /// Position among the users the matcher would still consider.
    /// Stale entries ahead are not counted.
    pub async fn queue_status(&self, user_id: &str) -> Result<QueuePosition, QueueServiceError> {
        let now = Utc::now();
        let contending: Vec<WaitQueueEntry> = self
            .list_waiting()
            .await?
            .into_iter()
            .filter(|entry| {
                entry.user_id == user_id || entry.is_fresh(now, self.staleness_window)
            })
            .collect();
        let position = contending
            .iter()
            .position(|entry| entry.user_id == user_id)
            .ok_or(QueueServiceError::NotFound)?;

        Ok(QueuePosition::new(position, contending.len()))
    }

    /// Deletes every entry idle past the staleness window, returning their user ids.
    pub async fn evict_stale(&self, now: DateTime<Utc>) -> Result<Vec<String>, QueueServiceError> {
        let stale: Vec<String> = self
            .list_waiting()
            .await?
            .into_iter()
            .filter(|entry| !entry.is_fresh(now, self.staleness_window))
            .map(|entry| entry.user_id)
            .collect();

        let mut evicted = Vec::new();
        for user_id in stale {
            let _guard = self.locks.lock(&KeyedLocks::user_key(&user_id)).await;

            // Re-read under the lock: a heartbeat may have landed since the scan.
            let Some(mut entry) = self.queue_repository.get_entry(&user_id).await? else {
                continue;
            };
            if entry.is_fresh(now, self.staleness_window) || entry.mark_cancelled().is_err() {
                continue;
            }
            if self.queue_repository.delete_entry(&user_id).await? {
                warn!(
                    user_id = %user_id,
                    last_activity_at = %entry.last_activity_at,
                    "Evicted stale queue entry"
                );
                evicted.push(user_id);
            }
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::conversation::Conversation;
    use crate::models::queue::AgeRange;
    use crate::repositories::conversation_repository::MockConversationRepository;
    use crate::repositories::errors::conversation_repository_errors::ConversationRepositoryError;
    use crate::repositories::memory_repository::InMemoryStore;
    use crate::repositories::queue_repository::MockQueueRepository;

    fn service_with(store: Arc<InMemoryStore>) -> QueueService {
        QueueService::new(
            store.clone(),
            store,
            Arc::new(KeyedLocks::new()),
            TimeDelta::minutes(5),
        )
    }

    fn service() -> (QueueService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (service_with(store.clone()), store)
    }

    #[tokio::test]
    async fn test_enqueue_twice_fails_second() {
        let (service, _) = service();

        service.enqueue("alice", Preferences::default()).await.unwrap();
        let result = service.enqueue("alice", Preferences::default()).await;

        assert!(matches!(result, Err(QueueServiceError::AlreadyQueued)));
        assert_eq!(service.list_waiting().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_user_in_conversation() {
        let (service, store) = service();
        let mut conversation = Conversation::new("alice", "bob", Preferences::default());
        conversation.activate(Utc::now()).unwrap();
        store.save_conversation(&conversation).await.unwrap();

        let result = service.enqueue("alice", Preferences::default()).await;

        assert!(matches!(
            result,
            Err(QueueServiceError::AlreadyInConversation)
        ));
    }

    #[tokio::test]
    async fn test_enqueue_validates_input() {
        let (service, _) = service();
        let preferences = Preferences {
            age_range: AgeRange { min: 40, max: 20 },
            ..Preferences::default()
        };

        assert!(matches!(
            service.enqueue("", Preferences::default()).await,
            Err(QueueServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.enqueue("alice", preferences).await,
            Err(QueueServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_dequeue_is_noop_when_absent() {
        let (service, _) = service();

        assert!(service.dequeue("ghost").await.unwrap().is_none());

        service.enqueue("alice", Preferences::default()).await.unwrap();
        let removed = service.dequeue("alice").await.unwrap().unwrap();
        assert_eq!(removed.status, QueueStatus::Cancelled);
        assert!(service.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_refreshes_activity() {
        let (service, store) = service();
        let mut entry = WaitQueueEntry::new("alice", Preferences::default());
        entry.last_activity_at = Utc::now() - TimeDelta::minutes(10);
        store.create_entry(&entry).await.unwrap();

        assert!(service.touch("alice").await.unwrap());
        assert!(!service.touch("bob").await.unwrap());

        let touched = service.get("alice").await.unwrap().unwrap();
        assert!(touched.is_fresh(Utc::now(), TimeDelta::minutes(5)));
    }

    #[tokio::test]
    async fn test_list_waiting_is_oldest_first_with_id_tiebreak() {
        let (service, store) = service();
        let t0 = Utc::now() - TimeDelta::seconds(30);
        for (user, joined_at) in [("carol", t0 + TimeDelta::seconds(5)), ("bob", t0), ("alice", t0)] {
            let mut entry = WaitQueueEntry::new(user, Preferences::default());
            entry.joined_at = joined_at;
            store.create_entry(&entry).await.unwrap();
        }

        let order: Vec<String> = service
            .list_waiting()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.user_id)
            .collect();

        assert_eq!(order, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn test_queue_status_reports_users_ahead() {
        let (service, store) = service();
        let t0 = Utc::now() - TimeDelta::seconds(30);
        for (i, user) in ["alice", "bob", "carol"].iter().enumerate() {
            let mut entry = WaitQueueEntry::new(user, Preferences::default());
            entry.joined_at = t0 + TimeDelta::seconds(i as i64);
            store.create_entry(&entry).await.unwrap();
        }

        let status = service.queue_status("bob").await.unwrap();

        assert_eq!(status.position, 1);
        assert_eq!(status.estimated_wait_seconds, 90);
        assert!(matches!(
            service.queue_status("dave").await,
            Err(QueueServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_queue_status_skips_stale_entries_ahead() {
        let (service, store) = service();
        let now = Utc::now();
        let t0 = now - TimeDelta::minutes(20);
        for (i, user) in ["alice", "bob", "carol"].iter().enumerate() {
            let mut entry = WaitQueueEntry::new(user, Preferences::default());
            entry.joined_at = t0 + TimeDelta::seconds(i as i64);
            entry.last_activity_at = now;
            store.create_entry(&entry).await.unwrap();
        }
        let mut idle = store.get_entry("alice").await.unwrap().unwrap();
        idle.last_activity_at = now - TimeDelta::minutes(10);
        store.update_entry(&idle).await.unwrap();

        let status = service.queue_status("carol").await.unwrap();

        assert_eq!(status.position, 1);
        assert_eq!(status.estimated_wait_seconds, 60);

        // A stale user still gets a position of their own.
        let own = service.queue_status("alice").await.unwrap();
        assert_eq!(own.position, 0);
    }

    #[tokio::test]
    async fn test_evict_stale_removes_only_idle_entries() {
        let (service, store) = service();
        let now = Utc::now();
        let mut stale = WaitQueueEntry::new("alice", Preferences::default());
        stale.last_activity_at = now - TimeDelta::minutes(6);
        store.create_entry(&stale).await.unwrap();
        service.enqueue("bob", Preferences::default()).await.unwrap();

        let evicted = service.evict_stale(now).await.unwrap();

        assert_eq!(evicted, vec!["alice".to_string()]);
        assert!(service.get("alice").await.unwrap().is_none());
        assert!(service.get("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_storage_failure_is_propagated() {
        let mut queue_repository = MockQueueRepository::new();
        queue_repository
            .expect_get_entry()
            .returning(|_| Err(QueueRepositoryError::DynamoDb("timeout".to_string())));
        let mut conversation_repository = MockConversationRepository::new();
        conversation_repository
            .expect_scan_conversations()
            .returning(|_| Ok(vec![]));

        let service = QueueService::new(
            Arc::new(queue_repository),
            Arc::new(conversation_repository),
            Arc::new(KeyedLocks::new()),
            TimeDelta::minutes(5),
        );

        let result = service.enqueue("alice", Preferences::default()).await;

        assert!(matches!(
            result,
            Err(QueueServiceError::QueueRepository(QueueRepositoryError::DynamoDb(msg))) if msg == "timeout"
        ));
    }

    #[tokio::test]
    async fn test_conversation_lookup_failure_is_propagated() {
        let queue_repository = MockQueueRepository::new();
        let mut conversation_repository = MockConversationRepository::new();
        conversation_repository
            .expect_scan_conversations()
            .returning(|_| Err(ConversationRepositoryError::DynamoDb("throttled".to_string())));

        let service = QueueService::new(
            Arc::new(queue_repository),
            Arc::new(conversation_repository),
            Arc::new(KeyedLocks::new()),
            TimeDelta::minutes(5),
        );

        let result = service.enqueue("alice", Preferences::default()).await;

        assert!(matches!(
            result,
            Err(QueueServiceError::ConversationRepository(_))
        ));
    }
}
