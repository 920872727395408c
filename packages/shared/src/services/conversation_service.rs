use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::conversation::{
    ChatMessage, Conversation, ConversationStatus, EndDetails, EndReason,
};
use crate::models::events::{PartnerInfo, ServerEvent};
use crate::models::queue::WaitQueueEntry;
use crate::repositories::conversation_repository::{ConversationFilter, ConversationRepository};
use crate::services::errors::conversation_service_errors::ConversationServiceError;
use crate::services::locks::KeyedLocks;
use crate::services::matcher::is_compatible;
use crate::services::notification_service::NotificationService;
use crate::services::queue_service::QueueService;

const MIN_RATING: u8 = 1;
const MAX_RATING: u8 = 5;

pub struct ConversationService {
    repository: Arc<dyn ConversationRepository + Send + Sync>,
    queue_service: Arc<QueueService>,
    notifier: NotificationService,
    locks: Arc<KeyedLocks>,
    max_message_length: usize,
}

impl ConversationService {
    pub fn new(
        repository: Arc<dyn ConversationRepository + Send + Sync>,
        queue_service: Arc<QueueService>,
        notifier: NotificationService,
        locks: Arc<KeyedLocks>,
        max_message_length: usize,
    ) -> Self {
        ConversationService {
            repository,
            queue_service,
            notifier,
            locks,
            max_message_length,
        }
    }

    /// Claims both users and opens an active conversation between them.
    ///
    /// Returns `None` when the claim is lost: either side left, rejoined, disconnected
    /// or was paired elsewhere since the snapshots were taken. Nothing is written then.
    pub async fn create_conversation(
        &self,
        seeker: &WaitQueueEntry,
        partner: &WaitQueueEntry,
    ) -> Result<Option<Conversation>, ConversationServiceError> {
        if seeker.user_id == partner.user_id {
            return Ok(None);
        }

        let mut claimed_seeker = seeker.clone();
        let mut claimed_partner = partner.clone();
        if claimed_seeker.mark_matched().is_err() || claimed_partner.mark_matched().is_err() {
            return Ok(None);
        }

        let guards = self
            .locks
            .lock_all(&[
                KeyedLocks::user_key(&seeker.user_id),
                KeyedLocks::user_key(&partner.user_id),
            ])
            .await;

        // The snapshots may predate a leave-then-rejoin with different preferences.
        let current_seeker = self.queue_service.get(&seeker.user_id).await?;
        let current_partner = self.queue_service.get(&partner.user_id).await?;
        let still_matchable = match (&current_seeker, &current_partner) {
            (Some(s), Some(p)) => {
                s.is_same_entry(seeker)
                    && p.is_same_entry(partner)
                    && is_compatible(&s.preferences, &p.preferences)
            }
            _ => false,
        };
        if !still_matchable {
            debug!(
                user_id = %seeker.user_id,
                partner_id = %partner.user_id,
                "Queue entries changed since the match was found"
            );
            return Ok(None);
        }

        let mut conversation = Conversation::new(
            &seeker.user_id,
            &partner.user_id,
            seeker.preferences.clone(),
        );
        conversation.activate(Utc::now())?;

        let claimed = self
            .repository
            .claim_pair(&conversation, seeker, partner)
            .await?;
        drop(guards);

        if !claimed {
            debug!(
                user_id = %seeker.user_id,
                partner_id = %partner.user_id,
                "Lost the claim, pair already taken"
            );
            return Ok(None);
        }

        info!(
            user_id = %claimed_seeker.user_id,
            partner_id = %claimed_partner.user_id,
            conversation_id = %conversation.id,
            "Matched pair"
        );

        self.notifier.notify(
            &seeker.user_id,
            ServerEvent::MatchFound {
                conversation: conversation.clone(),
                partner: PartnerInfo::describe(partner, seeker),
            },
        );
        self.notifier.notify(
            &partner.user_id,
            ServerEvent::MatchFound {
                conversation: conversation.clone(),
                partner: PartnerInfo::describe(seeker, partner),
            },
        );

        Ok(Some(conversation))
    }

    pub async fn post_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<ChatMessage, ConversationServiceError> {
        if content.trim().is_empty() {
            return Err(ConversationServiceError::InvalidInput(
                "Message content cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > self.max_message_length {
            return Err(ConversationServiceError::InvalidInput(format!(
                "Message exceeds {} characters",
                self.max_message_length
            )));
        }

        let guard = self
            .locks
            .lock(&KeyedLocks::conversation_key(conversation_id))
            .await;

        let mut conversation = self.load(conversation_id).await?;
        if conversation.status != ConversationStatus::Active {
            return Err(ConversationServiceError::NotActive);
        }
        let recipient = conversation
            .partner_of(sender_id)
            .map(str::to_string)
            .ok_or(ConversationServiceError::NotParticipant)?;

        let message = conversation.push_message(sender_id, content, Utc::now());
        self.repository.save_conversation(&conversation).await?;
        drop(guard);

        self.notifier.notify(
            &recipient,
            ServerEvent::MessageReceived {
                conversation_id: conversation.id.clone(),
                content: message.content.clone(),
                sender: message.sender_id.clone(),
                timestamp: message.timestamp,
            },
        );

        Ok(message)
    }

    pub async fn end_conversation(
        &self,
        conversation_id: &str,
        by: &str,
        details: EndDetails,
        reason: EndReason,
    ) -> Result<Conversation, ConversationServiceError> {
        if let Some(rating) = details.rating {
            if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                return Err(ConversationServiceError::InvalidInput(format!(
                    "Rating must be between {} and {}",
                    MIN_RATING, MAX_RATING
                )));
            }
        }

        let guard = self
            .locks
            .lock(&KeyedLocks::conversation_key(conversation_id))
            .await;

        let mut conversation = self.load(conversation_id).await?;
        if conversation.status == ConversationStatus::Ended {
            return Err(ConversationServiceError::AlreadyEnded);
        }
        let recipient = conversation
            .partner_of(by)
            .map(str::to_string)
            .ok_or(ConversationServiceError::NotParticipant)?;

        conversation.end(by, reason, details, Utc::now())?;
        self.repository.save_conversation(&conversation).await?;
        drop(guard);

        info!(
            conversation_id = %conversation.id,
            user_id = %by,
            reason = ?reason,
            duration_seconds = conversation.duration_seconds(),
            "Conversation ended"
        );

        self.notifier.notify(
            &recipient,
            ServerEvent::ChatEnded {
                conversation_id: conversation.id.clone(),
                reason,
            },
        );

        // The end is already committed.
        if let Err(e) = self.queue_service.dequeue(by).await {
            warn!(user_id = %by, error = %e, "Could not clear queue entry after ending");
        }

        Ok(conversation)
    }

    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, ConversationServiceError> {
        self.load(conversation_id).await
    }

    /// The user's waiting or active conversations.
    pub async fn open_conversations_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ConversationServiceError> {
        Ok(self
            .repository
            .scan_conversations(ConversationFilter::OpenFor(user_id.to_string()))
            .await?)
    }

    /// Every conversation the user took part in, most recent first.
    pub async fn conversations_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ConversationServiceError> {
        let mut conversations = self
            .repository
            .scan_conversations(ConversationFilter::Participant(user_id.to_string()))
            .await?;
        conversations.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(conversations)
    }

    async fn load(&self, conversation_id: &str) -> Result<Conversation, ConversationServiceError> {
        self.repository
            .get_conversation(conversation_id)
            .await?
            .ok_or(ConversationServiceError::NotFound)
    }
}
