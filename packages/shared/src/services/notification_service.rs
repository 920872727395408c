use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::models::events::ServerEvent;
use crate::services::errors::notification_service_errors::NotificationServiceError;
use crate::services::session_registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Handed to a background retry task.
    Deferred,
}

/// Pushes events to users' live sessions. Never blocks the caller: an unreachable
/// user gets a bounded number of background retries, then the event is dropped.
#[derive(Clone)]
pub struct NotificationService {
    registry: Arc<SessionRegistry>,
    policy: RetryPolicy,
}

impl NotificationService {
    pub fn new(registry: Arc<SessionRegistry>, policy: RetryPolicy) -> Self {
        NotificationService { registry, policy }
    }

    /// Must be called from within a tokio runtime.
    pub fn notify(&self, user_id: &str, event: ServerEvent) -> DeliveryOutcome {
        let event = match self.registry.deliver(user_id, event) {
            Ok(()) => return DeliveryOutcome::Delivered,
            Err(event) => event,
        };

        debug!(user_id = %user_id, event = event.kind(), "Session unavailable, deferring delivery");
        let registry = self.registry.clone();
        let policy = self.policy;
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            let kind = event.kind();
            if let Err(e) = deliver_with_retry(&registry, policy, &user_id, event).await {
                warn!(event = kind, "{}", e);
            }
        });

        DeliveryOutcome::Deferred
    }
}

/// Retries after each backoff delay until the user resolves or the budget runs out.
/// Returns the attempt that succeeded.
pub async fn deliver_with_retry(
    registry: &SessionRegistry,
    policy: RetryPolicy,
    user_id: &str,
    mut event: ServerEvent,
) -> Result<u32, NotificationServiceError> {
    for attempt in 1..=policy.max_attempts {
        sleep(policy.backoff.delay(attempt)).await;
        match registry.deliver(user_id, event) {
            Ok(()) => {
                debug!(user_id = %user_id, attempt, "Deferred delivery succeeded");
                return Ok(attempt);
            }
            Err(returned) => event = returned,
        }
    }

    Err(NotificationServiceError::DeliveryUnresolved {
        user_id: user_id.to_string(),
        attempts: policy.max_attempts,
    })
}
