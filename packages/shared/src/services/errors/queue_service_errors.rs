use thiserror::Error;

use crate::repositories::errors::conversation_repository_errors::ConversationRepositoryError;
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;

#[derive(Debug, Error)]
pub enum QueueServiceError {
    #[error("User is already in the queue")]
    AlreadyQueued,
    #[error("User is already in a conversation")]
    AlreadyInConversation,
    #[error("User is not in the queue")]
    NotFound,
    #[error("Validation error: {0}")]
    InvalidInput(String),
    #[error("Queue repository error: {0}")]
    QueueRepository(#[from] QueueRepositoryError),
    #[error("Conversation repository error: {0}")]
    ConversationRepository(#[from] ConversationRepositoryError),
}

impl QueueServiceError {
    /// Caller-caused errors, as opposed to storage failures.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            QueueServiceError::QueueRepository(_) | QueueServiceError::ConversationRepository(_)
        )
    }
}
