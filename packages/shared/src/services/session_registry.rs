//! Maps each user to the live connection that can reach them right now.
//!
//! Purely in memory and rebuilt from scratch on restart. Nothing durable
//! depends on what is bound here.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::models::events::ServerEvent;

/// Sending half of one live connection.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        SessionHandle {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// A fresh handle together with the receiver its connection drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (SessionHandle::new(sender), receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Hands the event back if the connection has gone away.
    pub fn send(&self, event: ServerEvent) -> Result<(), ServerEvent> {
        self.sender.send(event).map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for SessionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionHandle {}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
    owners: DashMap<Uuid, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last writer wins: a reconnect silently replaces the previous handle.
    pub fn bind(&self, user_id: &str, handle: SessionHandle) {
        if let Some(previous_owner) = self.owners.insert(handle.id(), user_id.to_string()) {
            if previous_owner != user_id {
                self.sessions
                    .remove_if(&previous_owner, |_, bound| bound.id() == handle.id());
            }
        }
        if let Some(replaced) = self.sessions.insert(user_id.to_string(), handle) {
            debug!(user_id = %user_id, replaced = %replaced.id(), "Session rebound");
        }
    }

    /// Returns the user the handle was bound to, or `None` when the handle was
    /// already unbound or has been superseded by a newer bind.
    pub fn unbind(&self, handle: &SessionHandle) -> Option<String> {
        let (_, user_id) = self.owners.remove(&handle.id())?;
        self.sessions
            .remove_if(&user_id, |_, bound| bound.id() == handle.id())
            .map(|_| user_id)
    }

    pub fn resolve(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.get(user_id).map(|entry| entry.value().clone())
    }

    /// Pushes `event` to the user's live session, handing it back when there is
    /// no session or its connection is closed.
    pub fn deliver(&self, user_id: &str, event: ServerEvent) -> Result<(), ServerEvent> {
        match self.resolve(user_id) {
            Some(handle) => handle.send(event),
            None => Err(event),
        }
    }

    pub fn connected_count(&self) -> usize {
        self.sessions.len()
    }
}
