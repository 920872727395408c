use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::conversation::{Conversation, EndReason};
use crate::models::queue::{Preferences, WaitQueueEntry};

/// Frames a client sends over its live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinQueue {
        #[serde(default)]
        preferences: Preferences,
    },
    LeaveQueue,
    SendMessage {
        conversation_id: String,
        content: String,
    },
    EndChat {
        conversation_id: String,
        #[serde(default)]
        rating: Option<u8>,
        #[serde(default)]
        report_reason: Option<String>,
    },
    Heartbeat,
}

/// What a matched user learns about their stranger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerInfo {
    pub user_id: String,
    pub language: String,
    pub interests: Vec<String>,
    pub shared_interests: Vec<String>,
}

impl PartnerInfo {
    /// Describes `partner` as seen by `viewer`.
    pub fn describe(partner: &WaitQueueEntry, viewer: &WaitQueueEntry) -> Self {
        PartnerInfo {
            user_id: partner.user_id.clone(),
            language: partner.preferences.language.clone(),
            interests: partner.preferences.interests.clone(),
            shared_interests: viewer.preferences.shared_interests(&partner.preferences),
        }
    }
}

/// Frames pushed to a client's live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    QueueJoined {
        position: usize,
        estimated_wait_seconds: u64,
    },
    QueueLeft,
    MatchFound {
        conversation: Conversation,
        partner: PartnerInfo,
    },
    MessageReceived {
        conversation_id: String,
        content: String,
        sender: String,
        timestamp: DateTime<Utc>,
    },
    ChatEnded {
        conversation_id: String,
        reason: EndReason,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::QueueJoined { .. } => "queue-joined",
            ServerEvent::QueueLeft => "queue-left",
            ServerEvent::MatchFound { .. } => "match-found",
            ServerEvent::MessageReceived { .. } => "message-received",
            ServerEvent::ChatEnded { .. } => "chat-ended",
            ServerEvent::Error { .. } => "error",
        }
    }
}
