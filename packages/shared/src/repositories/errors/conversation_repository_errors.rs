use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationRepositoryError {
    #[error("Conversation already exists")]
    AlreadyExists,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
}
