use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::services::matchmaking_service::MatchmakingService;

/// Runs a sweep every `sweep_interval` until the returned handle is aborted.
pub fn spawn_sweeper(service: Arc<MatchmakingService>) -> JoinHandle<()> {
    let period = service.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match service.sweep().await {
                Ok(report) if report.matched_pairs > 0 || report.evicted > 0 => {
                    info!(
                        "Sweep paired {} couples and evicted {} of {} waiting users",
                        report.matched_pairs, report.evicted, report.scanned
                    );
                }
                Ok(report) => debug!("Sweep found no pairs among {} waiting users", report.scanned),
                Err(e) => error!("Sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchmakingConfig;
    use crate::models::queue::{Preferences, WaitQueueEntry};
    use crate::repositories::memory_repository::InMemoryStore;
    use crate::repositories::queue_repository::{QueueFilter, QueueRepository};
    use crate::services::session_registry::SessionRegistry;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sweeper_pairs_users_queued_behind_its_back() {
        let store = Arc::new(InMemoryStore::new());
        let config = MatchmakingConfig {
            sweep_interval: Duration::from_millis(10),
            ..MatchmakingConfig::default()
        };
        let service = Arc::new(MatchmakingService::new(
            store.clone(),
            store.clone(),
            Arc::new(SessionRegistry::new()),
            config,
        ));
        for user in ["alice", "bob"] {
            store
                .create_entry(&WaitQueueEntry::new(user, Preferences::default()))
                .await
                .unwrap();
        }

        let sweeper = spawn_sweeper(service.clone());
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while !store.scan_entries(QueueFilter::All).await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        sweeper.abort();

        assert!(drained.is_ok());
        assert_eq!(service.history("alice").await.unwrap().len(), 1);
    }
}
