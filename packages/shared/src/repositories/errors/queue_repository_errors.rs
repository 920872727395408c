use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueRepositoryError {
    #[error("Queue entry not found")]
    NotFound,
    #[error("Queue entry already exists")]
    AlreadyExists,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
}
