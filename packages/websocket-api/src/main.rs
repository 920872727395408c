use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub mod actions;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::{ServerConfig, StoreBackend};
use shared::repositories::conversation_repository::{
    ConversationRepository, DynamoDbConversationRepository,
};
use shared::repositories::memory_repository::InMemoryStore;
use shared::repositories::queue_repository::{DynamoDbQueueRepository, QueueRepository};
use shared::services::matchmaking_service::MatchmakingService;
use shared::services::session_registry::SessionRegistry;
use shared::services::sweeper::spawn_sweeper;

type Repositories = (
    Arc<dyn QueueRepository + Send + Sync>,
    Arc<dyn ConversationRepository + Send + Sync>,
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (queue_repository, conversation_repository) = build_repositories(&config).await;
    let matchmaking_service = Arc::new(MatchmakingService::new(
        queue_repository,
        conversation_repository,
        Arc::new(SessionRegistry::new()),
        config.matchmaking.clone(),
    ));
    let sweeper = spawn_sweeper(matchmaking_service.clone());

    let app_state = state::AppState {
        matchmaking_service,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app: Router = routes::router().layer(cors).with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    info!(
        "Listening on {} with the {} store, sweeping every {:?}",
        config.bind_address, config.store, config.matchmaking.sweep_interval
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Shut down");
    Ok(())
}

async fn build_repositories(config: &ServerConfig) -> Repositories {
    match config.store {
        StoreBackend::Memory => {
            let store = Arc::new(InMemoryStore::new());
            let queue_repository: Arc<dyn QueueRepository + Send + Sync> = store.clone();
            let conversation_repository: Arc<dyn ConversationRepository + Send + Sync> = store;
            (queue_repository, conversation_repository)
        }
        StoreBackend::DynamoDb => {
            let aws_config = aws_config::load_from_env().await;
            let client = aws_sdk_dynamodb::Client::new(&aws_config);
            let queue_repository: Arc<dyn QueueRepository + Send + Sync> = Arc::new(
                DynamoDbQueueRepository::new(client.clone(), &config.queue_table),
            );
            let conversation_repository: Arc<dyn ConversationRepository + Send + Sync> =
                Arc::new(DynamoDbConversationRepository::new(
                    client,
                    &config.conversations_table,
                    &config.queue_table,
                ));
            (queue_repository, conversation_repository)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
