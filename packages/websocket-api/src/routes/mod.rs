use axum::{routing::get, Router};

use crate::state::AppState;

pub mod conversation;
pub mod health;
pub mod queue;
pub mod websocket;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(websocket::routes())
        .merge(queue::routes())
        .merge(conversation::routes())
}
