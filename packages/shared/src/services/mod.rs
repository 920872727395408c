pub mod conversation_service;
pub mod errors;
pub mod locks;
pub mod matcher;
pub mod matchmaking_service;
pub mod notification_service;
pub mod queue_service;
pub mod session_registry;
pub mod sweeper;
