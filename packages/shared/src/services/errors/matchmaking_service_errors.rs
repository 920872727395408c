use thiserror::Error;

use crate::services::errors::conversation_service_errors::ConversationServiceError;
use crate::services::errors::queue_service_errors::QueueServiceError;

#[derive(Debug, Error)]
pub enum MatchmakingServiceError {
    #[error(transparent)]
    Queue(#[from] QueueServiceError),
    #[error(transparent)]
    Conversation(#[from] ConversationServiceError),
}

impl MatchmakingServiceError {
    /// Expected, caller-caused errors that are reported back verbatim.
    /// Anything else is a storage failure.
    pub fn is_client_error(&self) -> bool {
        match self {
            MatchmakingServiceError::Queue(err) => err.is_client_error(),
            MatchmakingServiceError::Conversation(err) => err.is_client_error(),
        }
    }
}
