pub mod conversation;
pub mod errors;
pub mod events;
pub mod queue;
