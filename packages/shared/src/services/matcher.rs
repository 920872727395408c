//! Partner selection.
//!
//! The free functions are pure and safe to call from any task. [`Matcher`]
//! feeds them a fresh snapshot of the queue; claiming the chosen pair is a
//! separate step owned by the conversation service.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::models::queue::{Preferences, WaitQueueEntry};
use crate::services::errors::queue_service_errors::QueueServiceError;
use crate::services::queue_service::QueueService;

/// Both sides' filters accept the other's declared gender, and the age ranges overlap.
pub fn is_compatible(a: &Preferences, b: &Preferences) -> bool {
    a.gender_filter.accepts(b.gender)
        && b.gender_filter.accepts(a.gender)
        && a.age_range.overlaps(&b.age_range)
}

/// First compatible, fresh, waiting entry in `waiting` other than the seeker.
/// `waiting` must already be in queue order.
pub fn select_partner<'a>(
    seeker: &WaitQueueEntry,
    waiting: &'a [WaitQueueEntry],
    now: DateTime<Utc>,
    staleness_window: TimeDelta,
) -> Option<&'a WaitQueueEntry> {
    if !seeker.is_waiting() || !seeker.is_fresh(now, staleness_window) {
        return None;
    }

    waiting.iter().find(|candidate| {
        candidate.user_id != seeker.user_id
            && candidate.is_waiting()
            && candidate.is_fresh(now, staleness_window)
            && is_compatible(&seeker.preferences, &candidate.preferences)
    })
}

/// A pair the matcher would like to claim.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub seeker: WaitQueueEntry,
    pub partner: WaitQueueEntry,
}

#[derive(Clone)]
pub struct Matcher {
    queue_service: Arc<QueueService>,
}

impl Matcher {
    pub fn new(queue_service: Arc<QueueService>) -> Self {
        Matcher { queue_service }
    }

    pub async fn find_match(
        &self,
        user_id: &str,
    ) -> Result<Option<MatchCandidate>, QueueServiceError> {
        let Some(seeker) = self.queue_service.get(user_id).await? else {
            return Ok(None);
        };
        if !seeker.is_waiting() {
            return Ok(None);
        }

        let waiting = self.queue_service.list_waiting().await?;
        let partner = select_partner(
            &seeker,
            &waiting,
            Utc::now(),
            self.queue_service.staleness_window(),
        )
        .cloned();

        match partner {
            Some(partner) => {
                debug!(user_id = %user_id, partner_id = %partner.user_id, "Found match candidate");
                Ok(Some(MatchCandidate { seeker, partner }))
            }
            None => {
                debug!(user_id = %user_id, "No compatible partner, staying queued");
                Ok(None)
            }
        }
    }
}
