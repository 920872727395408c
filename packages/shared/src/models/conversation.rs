use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::errors::ModelError;
use crate::models::queue::Preferences;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Waiting,
    Active,
    Ended,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Waiting => write!(f, "waiting"),
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Ended => write!(f, "ended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Why a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// A participant chose to leave.
    Left,
    /// A participant's session was lost.
    Disconnect,
}

/// Optional feedback left by the participant who ends a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndDetails {
    pub rating: Option<u8>,
    pub report_reason: Option<String>,
}

/// A 1:1 stranger chat. Conversations are never deleted; ended ones are kept as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: [Participant; 2],
    pub status: ConversationStatus,
    pub preferences: Preferences,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
}

impl Conversation {
    pub fn new(user_a: &str, user_b: &str, preferences: Preferences) -> Self {
        let now = Utc::now();
        let participant = |user_id: &str| Participant {
            user_id: user_id.to_string(),
            joined_at: now,
            left_at: None,
        };

        Conversation {
            id: Uuid::new_v4().to_string(),
            participants: [participant(user_a), participant(user_b)],
            status: ConversationStatus::Waiting,
            preferences,
            started_at: None,
            ended_at: None,
            messages: vec![],
            rating: None,
            report_reason: None,
            ended_by: None,
            end_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status != ConversationStatus::Ended
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// The other participant's id, if `user_id` takes part in this conversation.
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        match &self.participants {
            [a, b] if a.user_id == user_id => Some(&b.user_id),
            [a, b] if b.user_id == user_id => Some(&a.user_id),
            _ => None,
        }
    }

    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), ModelError> {
        if self.status != ConversationStatus::Waiting {
            return Err(self.invalid_transition(ConversationStatus::Active));
        }
        self.status = ConversationStatus::Active;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn push_message(
        &mut self,
        sender_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> ChatMessage {
        let message = ChatMessage {
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            timestamp: now,
        };
        self.messages.push(message.clone());
        message
    }

    /// Ends the conversation on behalf of `by`, stamping their `left_at`.
    pub fn end(
        &mut self,
        by: &str,
        reason: EndReason,
        details: EndDetails,
        now: DateTime<Utc>,
    ) -> Result<(), ModelError> {
        if self.status == ConversationStatus::Ended {
            return Err(self.invalid_transition(ConversationStatus::Ended));
        }
        self.status = ConversationStatus::Ended;
        self.ended_at = Some(now);
        self.ended_by = Some(by.to_string());
        self.end_reason = Some(reason);
        self.rating = details.rating;
        self.report_reason = details.report_reason;
        if let Some(participant) = self.participants.iter_mut().find(|p| p.user_id == by) {
            participant.left_at = Some(now);
        }
        Ok(())
    }

    /// Whole seconds between start and end. Zero until ended, or if it never started.
    pub fn duration_seconds(&self) -> i64 {
        match (self.started_at, self.ended_at) {
            (Some(started_at), Some(ended_at)) => (ended_at - started_at).num_seconds(),
            _ => 0,
        }
    }

    fn invalid_transition(&self, to: ConversationStatus) -> ModelError {
        ModelError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn active_conversation() -> Conversation {
        let mut conversation = Conversation::new("alice", "bob", Preferences::default());
        conversation.activate(Utc::now()).unwrap();
        conversation
    }

    #[test]
    fn test_new_conversation_is_waiting() {
        let conversation = Conversation::new("alice", "bob", Preferences::default());

        assert_eq!(conversation.status, ConversationStatus::Waiting);
        assert!(conversation.started_at.is_none());
        assert!(conversation.messages.is_empty());
        assert_eq!(conversation.participants[0].user_id, "alice");
        assert_eq!(conversation.participants[1].user_id, "bob");
    }

    #[test]
    fn test_conversation_id_uniqueness() {
        let first = Conversation::new("alice", "bob", Preferences::default());
        let second = Conversation::new("alice", "bob", Preferences::default());

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_partner_of() {
        let conversation = active_conversation();

        assert_eq!(conversation.partner_of("alice"), Some("bob"));
        assert_eq!(conversation.partner_of("bob"), Some("alice"));
        assert_eq!(conversation.partner_of("carol"), None);
        assert!(!conversation.is_participant("carol"));
    }

    #[test]
    fn test_status_is_monotonic() {
        let mut conversation = active_conversation();
        assert!(conversation.activate(Utc::now()).is_err());

        conversation
            .end("alice", EndReason::Left, EndDetails::default(), Utc::now())
            .unwrap();
        assert!(conversation.activate(Utc::now()).is_err());
        assert!(conversation
            .end("bob", EndReason::Left, EndDetails::default(), Utc::now())
            .is_err());
        assert_eq!(conversation.ended_by.as_deref(), Some("alice"));
    }

    #[test]
    fn test_end_records_leaver_and_feedback() {
        let mut conversation = active_conversation();
        let now = Utc::now();
        let details = EndDetails {
            rating: Some(4),
            report_reason: Some("spam".to_string()),
        };

        conversation
            .end("bob", EndReason::Disconnect, details, now)
            .unwrap();

        assert_eq!(conversation.status, ConversationStatus::Ended);
        assert_eq!(conversation.participants[1].left_at, Some(now));
        assert!(conversation.participants[0].left_at.is_none());
        assert_eq!(conversation.rating, Some(4));
        assert_eq!(conversation.report_reason.as_deref(), Some("spam"));
        assert_eq!(conversation.end_reason, Some(EndReason::Disconnect));
    }

    #[test]
    fn test_duration_is_derived_from_timestamps() {
        let mut conversation = Conversation::new("alice", "bob", Preferences::default());
        let started_at = Utc::now();
        conversation.activate(started_at).unwrap();
        assert_eq!(conversation.duration_seconds(), 0);

        conversation
            .end(
                "alice",
                EndReason::Left,
                EndDetails::default(),
                started_at + TimeDelta::seconds(95),
            )
            .unwrap();

        assert_eq!(conversation.duration_seconds(), 95);
    }

    #[test]
    fn test_duration_is_zero_when_never_started() {
        let mut conversation = Conversation::new("alice", "bob", Preferences::default());
        conversation
            .end("alice", EndReason::Left, EndDetails::default(), Utc::now())
            .unwrap();

        assert_eq!(conversation.duration_seconds(), 0);
    }

    #[test]
    fn test_push_message_keeps_order() {
        let mut conversation = active_conversation();
        let now = Utc::now();

        conversation.push_message("alice", "hi", now);
        conversation.push_message("bob", "hello", now + TimeDelta::seconds(1));

        let senders: Vec<&str> = conversation
            .messages
            .iter()
            .map(|m| m.sender_id.as_str())
            .collect();
        assert_eq!(senders, vec!["alice", "bob"]);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut conversation = active_conversation();
        conversation.push_message("alice", "hi", Utc::now());

        let serialized = serde_json::to_string(&conversation).unwrap();
        assert!(serialized.contains("\"status\":\"active\""));
        assert!(!serialized.contains("rating"));

        let deserialized: Conversation = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, conversation);
    }
}
