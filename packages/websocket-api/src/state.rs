use std::sync::Arc;

use shared::services::matchmaking_service::MatchmakingService;

#[derive(Clone)]
pub struct AppState {
    pub matchmaking_service: Arc<MatchmakingService>,
}
