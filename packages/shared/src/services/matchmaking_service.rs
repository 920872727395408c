//! Entry point the transport talks to. Wires the queue, matcher, conversation
//! lifecycle and delivery together and owns the sweep.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::MatchmakingConfig;
use crate::models::conversation::{ChatMessage, Conversation, EndDetails, EndReason};
use crate::models::events::ServerEvent;
use crate::models::queue::{Preferences, QueuePosition};
use crate::repositories::conversation_repository::ConversationRepository;
use crate::repositories::queue_repository::QueueRepository;
use crate::services::conversation_service::ConversationService;
use crate::services::errors::conversation_service_errors::ConversationServiceError;
use crate::services::errors::matchmaking_service_errors::MatchmakingServiceError;
use crate::services::errors::queue_service_errors::QueueServiceError;
use crate::services::locks::KeyedLocks;
use crate::services::matcher::Matcher;
use crate::services::notification_service::NotificationService;
use crate::services::queue_service::QueueService;
use crate::services::session_registry::{SessionHandle, SessionRegistry};

/// Candidates tried per match attempt before leaving the user for the next sweep.
const MAX_CLAIM_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub matched_pairs: usize,
    pub evicted: usize,
}

pub struct MatchmakingService {
    registry: Arc<SessionRegistry>,
    locks: Arc<KeyedLocks>,
    queue_service: Arc<QueueService>,
    conversation_service: ConversationService,
    notifier: NotificationService,
    matcher: Matcher,
    config: MatchmakingConfig,
}

impl MatchmakingService {
    pub fn new(
        queue_repository: Arc<dyn QueueRepository + Send + Sync>,
        conversation_repository: Arc<dyn ConversationRepository + Send + Sync>,
        registry: Arc<SessionRegistry>,
        config: MatchmakingConfig,
    ) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        let notifier = NotificationService::new(registry.clone(), config.delivery);
        let queue_service = Arc::new(QueueService::new(
            queue_repository,
            conversation_repository.clone(),
            locks.clone(),
            config.staleness_delta(),
        ));
        let conversation_service = ConversationService::new(
            conversation_repository,
            queue_service.clone(),
            notifier.clone(),
            locks.clone(),
            config.max_message_length,
        );

        MatchmakingService {
            registry,
            locks,
            matcher: Matcher::new(queue_service.clone()),
            queue_service,
            conversation_service,
            notifier,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Binds a freshly opened connection. Queue and conversation state are untouched.
    pub fn connect(&self, user_id: &str, handle: SessionHandle) {
        self.registry.bind(user_id, handle);
        info!(user_id = %user_id, "Session connected");
    }

    /// Queues the user, confirms with `queue-joined`, then tries to pair them
    /// straight away.
    pub async fn join_queue(
        &self,
        user_id: &str,
        preferences: Preferences,
    ) -> Result<QueuePosition, MatchmakingServiceError> {
        self.queue_service.enqueue(user_id, preferences).await?;

        let position = match self.queue_service.queue_status(user_id).await {
            Ok(position) => position,
            // Already claimed by a concurrent sweep.
            Err(QueueServiceError::NotFound) => QueuePosition::new(0, 1),
            Err(e) => return Err(e.into()),
        };
        self.notifier.notify(
            user_id,
            ServerEvent::QueueJoined {
                position: position.position,
                estimated_wait_seconds: position.estimated_wait_seconds,
            },
        );

        if let Err(e) = self.try_match(user_id).await {
            error!(user_id = %user_id, error = %e, "Immediate match attempt failed");
        }

        Ok(position)
    }

    /// Returns whether the user was actually queued.
    pub async fn leave_queue(&self, user_id: &str) -> Result<bool, MatchmakingServiceError> {
        let removed = self.queue_service.dequeue(user_id).await?;
        self.notifier.notify(user_id, ServerEvent::QueueLeft);
        Ok(removed.is_some())
    }

    pub async fn heartbeat(&self, user_id: &str) -> Result<bool, MatchmakingServiceError> {
        Ok(self.queue_service.touch(user_id).await?)
    }

    /// One match attempt for `user_id`. Immediate joins and the sweep share this path.
    pub async fn try_match(
        &self,
        user_id: &str,
    ) -> Result<Option<Conversation>, MatchmakingServiceError> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let Some(candidate) = self.matcher.find_match(user_id).await? else {
                return Ok(None);
            };
            if let Some(conversation) = self
                .conversation_service
                .create_conversation(&candidate.seeker, &candidate.partner)
                .await?
            {
                return Ok(Some(conversation));
            }
        }

        debug!(user_id = %user_id, attempts = MAX_CLAIM_ATTEMPTS, "Gave up after lost claims");
        Ok(None)
    }

    /// Attempts a match for every waiting user not already paired in this pass.
    /// A failure for one user is logged and the pass carries on.
    pub async fn sweep(&self) -> Result<SweepReport, MatchmakingServiceError> {
        let mut report = SweepReport::default();

        if self.config.evict_stale {
            match self.queue_service.evict_stale(Utc::now()).await {
                Ok(evicted) => report.evicted = evicted.len(),
                Err(e) => error!(error = %e, "Stale eviction failed"),
            }
        }

        let waiting = self.queue_service.list_waiting().await?;
        report.scanned = waiting.len();

        let mut paired: HashSet<String> = HashSet::new();
        for entry in &waiting {
            if paired.contains(&entry.user_id) {
                continue;
            }
            match self.try_match(&entry.user_id).await {
                Ok(Some(conversation)) => {
                    report.matched_pairs += 1;
                    for participant in &conversation.participants {
                        paired.insert(participant.user_id.clone());
                    }
                }
                Ok(None) => {}
                Err(e) => error!(
                    user_id = %entry.user_id,
                    error = %e,
                    "Sweep failed to match user"
                ),
            }
        }

        self.locks.prune();
        Ok(report)
    }

    pub async fn post_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<ChatMessage, MatchmakingServiceError> {
        Ok(self
            .conversation_service
            .post_message(conversation_id, sender_id, content)
            .await?)
    }

    pub async fn end_chat(
        &self,
        conversation_id: &str,
        user_id: &str,
        details: EndDetails,
    ) -> Result<Conversation, MatchmakingServiceError> {
        Ok(self
            .conversation_service
            .end_conversation(conversation_id, user_id, details, EndReason::Left)
            .await?)
    }

    /// Cleans up after a lost connection. Returns the user it belonged to, or
    /// `None` when the handle had already been superseded, in which case nothing
    /// else is touched.
    pub async fn disconnect(
        &self,
        handle: &SessionHandle,
    ) -> Result<Option<String>, MatchmakingServiceError> {
        let Some(user_id) = self.registry.unbind(handle) else {
            debug!(session = %handle.id(), "Stale session closed, nothing to clean up");
            return Ok(None);
        };
        info!(user_id = %user_id, "Session disconnected");

        self.queue_service.dequeue(&user_id).await?;

        let open = self
            .conversation_service
            .open_conversations_for(&user_id)
            .await?;
        for conversation in open {
            match self
                .conversation_service
                .end_conversation(
                    &conversation.id,
                    &user_id,
                    EndDetails::default(),
                    EndReason::Disconnect,
                )
                .await
            {
                Ok(_)
                | Err(ConversationServiceError::AlreadyEnded)
                | Err(ConversationServiceError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Some(user_id))
    }

    pub async fn queue_status(
        &self,
        user_id: &str,
    ) -> Result<QueuePosition, MatchmakingServiceError> {
        Ok(self.queue_service.queue_status(user_id).await?)
    }

    pub async fn conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, MatchmakingServiceError> {
        Ok(self
            .conversation_service
            .get_conversation(conversation_id)
            .await?)
    }

    pub async fn history(
        &self,
        user_id: &str,
    ) -> Result<Vec<Conversation>, MatchmakingServiceError> {
        Ok(self.conversation_service.conversations_for(user_id).await?)
    }
}
