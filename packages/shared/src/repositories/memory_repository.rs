use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::models::conversation::Conversation;
use crate::models::queue::WaitQueueEntry;
use crate::repositories::conversation_repository::{ConversationFilter, ConversationRepository};
use crate::repositories::errors::conversation_repository_errors::ConversationRepositoryError;
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;
use crate::repositories::queue_repository::{QueueFilter, QueueRepository};

#[derive(Default)]
struct StoreState {
    queue: HashMap<String, WaitQueueEntry>,
    conversations: HashMap<String, Conversation>,
}

/// Process-local store backing both repositories.
/// One lock covers both tables so `claim_pair` is all-or-nothing.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueRepository for InMemoryStore {
    async fn get_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<WaitQueueEntry>, QueueRepositoryError> {
        Ok(self.state.lock().queue.get(user_id).cloned())
    }

    async fn create_entry(&self, entry: &WaitQueueEntry) -> Result<(), QueueRepositoryError> {
        let mut state = self.state.lock();
        if state.queue.contains_key(&entry.user_id) {
            return Err(QueueRepositoryError::AlreadyExists);
        }
        state.queue.insert(entry.user_id.clone(), entry.clone());
        Ok(())
    }

    async fn update_entry(&self, entry: &WaitQueueEntry) -> Result<(), QueueRepositoryError> {
        let mut state = self.state.lock();
        match state.queue.get_mut(&entry.user_id) {
            Some(stored) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(QueueRepositoryError::NotFound),
        }
    }

    async fn delete_entry(&self, user_id: &str) -> Result<bool, QueueRepositoryError> {
        Ok(self.state.lock().queue.remove(user_id).is_some())
    }

    async fn scan_entries(
        &self,
        filter: QueueFilter,
    ) -> Result<Vec<WaitQueueEntry>, QueueRepositoryError> {
        let state = self.state.lock();
        Ok(state
            .queue
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, ConversationRepositoryError> {
        Ok(self.state.lock().conversations.get(conversation_id).cloned())
    }

    async fn save_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), ConversationRepositoryError> {
        self.state
            .lock()
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn scan_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, ConversationRepositoryError> {
        let state = self.state.lock();
        Ok(state
            .conversations
            .values()
            .filter(|conversation| filter.matches(conversation))
            .cloned()
            .collect())
    }

    async fn claim_pair(
        &self,
        conversation: &Conversation,
        seeker: &WaitQueueEntry,
        partner: &WaitQueueEntry,
    ) -> Result<bool, ConversationRepositoryError> {
        let mut state = self.state.lock();
        if state.conversations.contains_key(&conversation.id) {
            return Err(ConversationRepositoryError::AlreadyExists);
        }

        let unchanged = |snapshot: &WaitQueueEntry| {
            state
                .queue
                .get(&snapshot.user_id)
                .is_some_and(|entry| entry.is_waiting() && entry.is_same_entry(snapshot))
        };
        if seeker.user_id == partner.user_id || !unchanged(seeker) || !unchanged(partner) {
            return Ok(false);
        }

        state.queue.remove(&seeker.user_id);
        state.queue.remove(&partner.user_id);
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(true)
    }
}
