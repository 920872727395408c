use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared::models::events::ServerEvent;
use shared::services::errors::{
    conversation_service_errors::ConversationServiceError,
    matchmaking_service_errors::MatchmakingServiceError, queue_service_errors::QueueServiceError,
};
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub enum ApiError {
    Matchmaking(MatchmakingServiceError),
}

impl From<MatchmakingServiceError> for ApiError {
    fn from(error: MatchmakingServiceError) -> Self {
        ApiError::Matchmaking(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Matchmaking(MatchmakingServiceError::Queue(err)) => queue_status(err),
            ApiError::Matchmaking(MatchmakingServiceError::Conversation(err)) => {
                conversation_status(err)
            }
        }
    }

    /// Text shown to the client. Storage failures are not described.
    pub fn message(&self) -> String {
        match self {
            ApiError::Matchmaking(err) if err.is_client_error() => err.to_string(),
            ApiError::Matchmaking(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    /// Logs storage failures and turns the error into an `error` event.
    pub fn into_event(self, user_id: &str) -> ServerEvent {
        if self.status().is_server_error() {
            error!(user_id = %user_id, error = ?self, "Request failed");
        }
        ServerEvent::error(self.message())
    }
}

fn queue_status(err: &QueueServiceError) -> StatusCode {
    match err {
        QueueServiceError::AlreadyQueued | QueueServiceError::AlreadyInConversation => {
            StatusCode::CONFLICT
        }
        QueueServiceError::NotFound => StatusCode::NOT_FOUND,
        QueueServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        QueueServiceError::QueueRepository(_) | QueueServiceError::ConversationRepository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn conversation_status(err: &ConversationServiceError) -> StatusCode {
    match err {
        ConversationServiceError::NotFound => StatusCode::NOT_FOUND,
        ConversationServiceError::NotActive | ConversationServiceError::AlreadyEnded => {
            StatusCode::CONFLICT
        }
        ConversationServiceError::NotParticipant => StatusCode::FORBIDDEN,
        ConversationServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ConversationServiceError::Queue(err) => queue_status(err),
        ConversationServiceError::Model(_)
        | ConversationServiceError::ConversationRepository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
