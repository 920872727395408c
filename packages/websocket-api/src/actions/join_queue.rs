use shared::models::queue::Preferences;
use tracing::debug;

use crate::actions::ActionResult;
use crate::state::AppState;

/// `queue-joined` and any immediate `match-found` arrive through the session channel.
pub async fn handle_join_queue(
    state: &AppState,
    user_id: &str,
    preferences: Preferences,
) -> ActionResult {
    let position = state
        .matchmaking_service
        .join_queue(user_id, preferences)
        .await?;

    debug!(user_id = %user_id, position = position.position, "Joined queue");
    Ok(None)
}
