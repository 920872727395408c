use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationServiceError {
    #[error("No live session for user {user_id} after {attempts} attempts")]
    DeliveryUnresolved { user_id: String, attempts: u32 },
}
