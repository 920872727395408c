use crate::models::conversation::{Conversation, ConversationStatus};
use crate::models::queue::{QueueStatus, WaitQueueEntry};
use crate::repositories::errors::conversation_repository_errors::ConversationRepositoryError;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};

#[cfg(test)]
use mockall::automock;

/// Which conversations a scan should return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationFilter {
    #[default]
    All,
    /// Every conversation the user took part in.
    Participant(String),
    /// The user's waiting or active conversations.
    OpenFor(String),
}

impl ConversationFilter {
    pub fn matches(&self, conversation: &Conversation) -> bool {
        match self {
            ConversationFilter::All => true,
            ConversationFilter::Participant(user_id) => conversation.is_participant(user_id),
            ConversationFilter::OpenFor(user_id) => {
                conversation.is_open() && conversation.is_participant(user_id)
            }
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, ConversationRepositoryError>;

    async fn save_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), ConversationRepositoryError>;

    async fn scan_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, ConversationRepositoryError>;

    /// Removes both users' queue entries and inserts `conversation` as one atomic write.
    /// Returns `false`, writing nothing, when either stored entry is missing, no longer
    /// waiting, or is not the entry the caller matched on (the user left and rejoined).
    async fn claim_pair(
        &self,
        conversation: &Conversation,
        seeker: &WaitQueueEntry,
        partner: &WaitQueueEntry,
    ) -> Result<bool, ConversationRepositoryError>;
}

/// Conversation table keyed by `id`. Claims also write to the queue table.
pub struct DynamoDbConversationRepository {
    pub client: Client,
    pub table_name: String,
    pub queue_table_name: String,
}

impl DynamoDbConversationRepository {
    pub fn new(client: Client, table_name: &str, queue_table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
            queue_table_name: queue_table_name.to_string(),
        }
    }

    fn dequeue_waiting(
        &self,
        entry: &WaitQueueEntry,
    ) -> Result<TransactWriteItem, ConversationRepositoryError> {
        let joined_at: AttributeValue = to_attribute_value(entry.joined_at)
            .map_err(|e| ConversationRepositoryError::Serialization(e.to_string()))?;

        let delete = Delete::builder()
            .table_name(&self.queue_table_name)
            .key("user_id", AttributeValue::S(entry.user_id.clone()))
            .condition_expression("#status = :waiting AND joined_at = :joined_at")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":waiting",
                AttributeValue::S(QueueStatus::Waiting.to_string()),
            )
            .expression_attribute_values(":joined_at", joined_at)
            .build()
            .map_err(|e| ConversationRepositoryError::DynamoDb(e.to_string()))?;

        Ok(TransactWriteItem::builder().delete(delete).build())
    }
}

#[async_trait]
impl ConversationRepository for DynamoDbConversationRepository {
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, ConversationRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(conversation_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| ConversationRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            let conversation: Conversation = from_item(item)
                .map_err(|e| ConversationRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(conversation))
        } else {
            Ok(None)
        }
    }

    async fn save_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), ConversationRepositoryError> {
        let item = to_item(conversation)
            .map_err(|e| ConversationRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| ConversationRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn scan_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, ConversationRepositoryError> {
        let mut conversations = Vec::new();
        let mut start_key = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .consistent_read(true)
                .set_exclusive_start_key(start_key);

            match &filter {
                ConversationFilter::All => {}
                ConversationFilter::Participant(user_id) => {
                    request = request
                        .filter_expression(
                            "participants[0].user_id = :uid OR participants[1].user_id = :uid",
                        )
                        .expression_attribute_values(":uid", AttributeValue::S(user_id.clone()));
                }
                ConversationFilter::OpenFor(user_id) => {
                    request = request
                        .filter_expression(
                            "(participants[0].user_id = :uid OR participants[1].user_id = :uid) \
                             AND #status <> :ended",
                        )
                        .expression_attribute_names("#status", "status")
                        .expression_attribute_values(":uid", AttributeValue::S(user_id.clone()))
                        .expression_attribute_values(
                            ":ended",
                            AttributeValue::S(ConversationStatus::Ended.to_string()),
                        );
                }
            }

            let output = request
                .send()
                .await
                .map_err(|e| ConversationRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let conversation: Conversation = from_item(item)
                    .map_err(|e| ConversationRepositoryError::Serialization(e.to_string()))?;
                conversations.push(conversation);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(conversations)
    }

    async fn claim_pair(
        &self,
        conversation: &Conversation,
        seeker: &WaitQueueEntry,
        partner: &WaitQueueEntry,
    ) -> Result<bool, ConversationRepositoryError> {
        let item = to_item(conversation)
            .map_err(|e| ConversationRepositoryError::Serialization(e.to_string()))?;
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(|e| ConversationRepositoryError::DynamoDb(e.to_string()))?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(self.dequeue_waiting(seeker)?)
            .transact_items(self.dequeue_waiting(partner)?)
            .transact_items(TransactWriteItem::builder().put(put).build())
            .send()
            .await;

        // A cancelled transaction means one of the conditions failed: someone else won.
        match result {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_transaction_canceled_exception() =>
            {
                Ok(false)
            }
            Err(e) => Err(ConversationRepositoryError::DynamoDb(e.to_string())),
        }
    }
}
