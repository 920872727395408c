use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use shared::models::queue::QueuePosition;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/queue/status/{user_id}", get(queue_status))
}

/// Polling fallback for clients without a live socket.
async fn queue_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<QueuePosition>, ApiError> {
    let position = state.matchmaking_service.queue_status(&user_id).await?;

    debug!(user_id = %user_id, position = position.position, "Queue status requested");
    Ok(Json(position))
}
