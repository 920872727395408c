pub mod conversation_repository;
pub mod errors;
pub mod memory_repository;
pub mod queue_repository;
