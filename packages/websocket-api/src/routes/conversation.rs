use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use shared::models::conversation::Conversation;

use crate::{error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/conversations/{conversation_id}", get(get_conversation))
}

/// A stored conversation plus its derived duration.
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub duration_seconds: i64,
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let conversation = state
        .matchmaking_service
        .conversation(&conversation_id)
        .await?;

    Ok(Json(ConversationResponse {
        duration_seconds: conversation.duration_seconds(),
        conversation,
    }))
}
