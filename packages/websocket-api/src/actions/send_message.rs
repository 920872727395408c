use crate::actions::ActionResult;
use crate::state::AppState;

pub async fn handle_send_message(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
    content: &str,
) -> ActionResult {
    state
        .matchmaking_service
        .post_message(conversation_id, user_id, content)
        .await?;
    Ok(None)
}
