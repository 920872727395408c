//! Per-key async locks serializing writes for one user or one conversation.
//!
//! Multi-key callers go through [`KeyedLocks::lock_all`], which acquires in
//! sorted order. `conversation:` keys sort before `user:` keys, so every
//! caller follows the same global order.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type KeyGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_key(user_id: &str) -> String {
        format!("user:{}", user_id)
    }

    pub fn conversation_key(conversation_id: &str) -> String {
        format!("conversation:{}", conversation_id)
    }

    fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.slot(key).lock_owned().await
    }

    /// Locks every key, in sorted order, skipping duplicates.
    pub async fn lock_all(&self, keys: &[String]) -> Vec<KeyGuard> {
        let mut ordered: Vec<&String> = keys.iter().collect();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Drops slots nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
