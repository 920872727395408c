use crate::models::queue::{QueueStatus, WaitQueueEntry};
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};

#[cfg(test)]
use mockall::automock;

/// Which queue entries a scan should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueFilter {
    #[default]
    All,
    Status(QueueStatus),
}

impl QueueFilter {
    pub fn matches(&self, entry: &WaitQueueEntry) -> bool {
        match self {
            QueueFilter::All => true,
            QueueFilter::Status(status) => entry.status == *status,
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn get_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<WaitQueueEntry>, QueueRepositoryError>;

    /// Inserts a new entry. Fails with `AlreadyExists` if the user already has one.
    async fn create_entry(&self, entry: &WaitQueueEntry) -> Result<(), QueueRepositoryError>;

    /// Overwrites an existing entry. Fails with `NotFound` if it is gone.
    async fn update_entry(&self, entry: &WaitQueueEntry) -> Result<(), QueueRepositoryError>;

    /// Returns whether an entry was actually removed.
    async fn delete_entry(&self, user_id: &str) -> Result<bool, QueueRepositoryError>;

    async fn scan_entries(
        &self,
        filter: QueueFilter,
    ) -> Result<Vec<WaitQueueEntry>, QueueRepositoryError>;
}

/// Queue table keyed by `user_id`.
pub struct DynamoDbQueueRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbQueueRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    fn key(user_id: &str) -> AttributeValue {
        AttributeValue::S(user_id.to_string())
    }
}

#[async_trait]
impl QueueRepository for DynamoDbQueueRepository {
    async fn get_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<WaitQueueEntry>, QueueRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("user_id", Self::key(user_id))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        match result.item {
            Some(item) => {
                let entry: WaitQueueEntry = from_item(item)
                    .map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn create_entry(&self, entry: &WaitQueueEntry) -> Result<(), QueueRepositoryError> {
        let item = to_item(entry).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(user_id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_conditional_check_failed_exception() =>
            {
                Err(QueueRepositoryError::AlreadyExists)
            }
            Err(e) => Err(QueueRepositoryError::DynamoDb(e.to_string())),
        }
    }

    async fn update_entry(&self, entry: &WaitQueueEntry) -> Result<(), QueueRepositoryError> {
        let item = to_item(entry).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_exists(user_id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_conditional_check_failed_exception() =>
            {
                Err(QueueRepositoryError::NotFound)
            }
            Err(e) => Err(QueueRepositoryError::DynamoDb(e.to_string())),
        }
    }

    async fn delete_entry(&self, user_id: &str) -> Result<bool, QueueRepositoryError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("user_id", Self::key(user_id))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

        Ok(result.attributes().is_some_and(|old| !old.is_empty()))
    }

    async fn scan_entries(
        &self,
        filter: QueueFilter,
    ) -> Result<Vec<WaitQueueEntry>, QueueRepositoryError> {
        let mut entries = Vec::new();
        let mut start_key = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .consistent_read(true)
                .set_exclusive_start_key(start_key);

            if let QueueFilter::Status(status) = filter {
                request = request
                    .filter_expression("#status = :status")
                    .expression_attribute_names("#status", "status")
                    .expression_attribute_values(":status", AttributeValue::S(status.to_string()));
            }

            let output = request
                .send()
                .await
                .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let entry: WaitQueueEntry = from_item(item)
                    .map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
                entries.push(entry);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(entries)
    }
}
