pub mod conversation_service_errors;
pub mod matchmaking_service_errors;
pub mod notification_service_errors;
pub mod queue_service_errors;
