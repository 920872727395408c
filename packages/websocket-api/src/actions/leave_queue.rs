use tracing::debug;

use crate::actions::ActionResult;
use crate::state::AppState;

pub async fn handle_leave_queue(state: &AppState, user_id: &str) -> ActionResult {
    let removed = state.matchmaking_service.leave_queue(user_id).await?;
    if !removed {
        debug!(user_id = %user_id, "Left a queue they were not in");
    }
    Ok(None)
}
