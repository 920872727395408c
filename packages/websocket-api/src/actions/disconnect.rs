use tracing::{debug, error};

use crate::actions::Connection;
use crate::state::AppState;

/// Runs once the socket is gone. Failures are logged; there is nobody left to tell.
pub async fn handle_disconnect(state: &AppState, connection: &Connection) {
    match state.matchmaking_service.disconnect(&connection.handle).await {
        Ok(Some(user_id)) => debug!(user_id = %user_id, "Cleaned up after disconnect"),
        Ok(None) => debug!(user_id = %connection.user_id, "Connection was already superseded"),
        Err(e) => error!(
            user_id = %connection.user_id,
            error = %e,
            "Failed to clean up after disconnect"
        ),
    }
}
