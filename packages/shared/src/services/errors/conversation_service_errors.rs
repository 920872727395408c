use thiserror::Error;

use crate::models::errors::ModelError;
use crate::repositories::errors::conversation_repository_errors::ConversationRepositoryError;
use crate::services::errors::queue_service_errors::QueueServiceError;

#[derive(Debug, Error)]
pub enum ConversationServiceError {
    #[error("Conversation not found")]
    NotFound,
    #[error("Conversation is not active")]
    NotActive,
    #[error("User is not a participant in this conversation")]
    NotParticipant,
    #[error("Conversation has already ended")]
    AlreadyEnded,
    #[error("Validation error: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Conversation repository error: {0}")]
    ConversationRepository(#[from] ConversationRepositoryError),
    #[error(transparent)]
    Queue(#[from] QueueServiceError),
}

impl ConversationServiceError {
    pub fn is_client_error(&self) -> bool {
        match self {
            ConversationServiceError::Model(_)
            | ConversationServiceError::ConversationRepository(_) => false,
            ConversationServiceError::Queue(err) => err.is_client_error(),
            _ => true,
        }
    }
}
