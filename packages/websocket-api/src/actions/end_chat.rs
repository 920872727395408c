use shared::models::conversation::{EndDetails, EndReason};
use shared::models::events::ServerEvent;

use crate::actions::ActionResult;
use crate::state::AppState;

/// The partner is told through delivery; the caller gets the same `chat-ended` as an ack.
pub async fn handle_end_chat(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
    rating: Option<u8>,
    report_reason: Option<String>,
) -> ActionResult {
    let details = EndDetails {
        rating,
        report_reason,
    };
    let conversation = state
        .matchmaking_service
        .end_chat(conversation_id, user_id, details)
        .await?;

    Ok(Some(ServerEvent::ChatEnded {
        conversation_id: conversation.id,
        reason: conversation.end_reason.unwrap_or(EndReason::Left),
    }))
}
