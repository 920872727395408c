use crate::actions::ActionResult;
use crate::state::AppState;

/// Keeps a waiting entry fresh. Silent whether or not the user is queued.
pub async fn handle_heartbeat(state: &AppState, user_id: &str) -> ActionResult {
    state.matchmaking_service.heartbeat(user_id).await?;
    Ok(None)
}
