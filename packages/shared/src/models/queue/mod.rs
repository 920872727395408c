use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::errors::ModelError;

/// Seconds of expected wait contributed by each waiting user.
const WAIT_SECONDS_PER_ENTRY: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderFilter {
    Male,
    Female,
    #[default]
    Any,
}

impl GenderFilter {
    /// Whether a partner who declared `gender` passes this filter.
    /// Only `Any` accepts a partner with no declared gender.
    pub fn accepts(self, gender: Option<Gender>) -> bool {
        matches!(
            (self, gender),
            (GenderFilter::Any, _)
                | (GenderFilter::Male, Some(Gender::Male))
                | (GenderFilter::Female, Some(Gender::Female))
        )
    }
}

/// Inclusive range of partner ages a user is willing to be matched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub fn new(min: u8, max: u8) -> Result<Self, ModelError> {
        if min > max {
            return Err(ModelError::InvalidAgeRange { min, max });
        }
        Ok(AgeRange { min, max })
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn overlaps(&self, other: &AgeRange) -> bool {
        self.min <= other.max && self.max >= other.min
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        AgeRange { min: 18, max: 99 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub language: String,
    pub age_range: AgeRange,
    pub gender_filter: GenderFilter,
    pub interests: Vec<String>,
    /// The user's own declared gender, checked against the partner's filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            language: "en".to_string(),
            age_range: AgeRange::default(),
            gender_filter: GenderFilter::Any,
            interests: vec![],
            gender: None,
        }
    }
}

impl Preferences {
    /// Interests both sides listed, compared case-insensitively, in `self`'s order.
    pub fn shared_interests(&self, other: &Preferences) -> Vec<String> {
        self.interests
            .iter()
            .filter(|interest| {
                other
                    .interests
                    .iter()
                    .any(|theirs| theirs.eq_ignore_ascii_case(interest))
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Waiting,
    Matched,
    Cancelled,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Waiting => write!(f, "waiting"),
            QueueStatus::Matched => write!(f, "matched"),
            QueueStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A user currently waiting for a stranger to chat with.
/// Stored one item per user, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WaitQueueEntry {
    pub user_id: String,
    pub preferences: Preferences,
    pub joined_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub status: QueueStatus,
}

impl WaitQueueEntry {
    pub fn new(user_id: &str, preferences: Preferences) -> Self {
        let now = Utc::now();
        WaitQueueEntry {
            user_id: user_id.to_string(),
            preferences,
            joined_at: now,
            last_activity_at: now,
            status: QueueStatus::Waiting,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == QueueStatus::Waiting
    }

    /// An entry is fresh while its last activity is no older than `window`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now - self.last_activity_at <= window
    }

    /// Same user and same join. A leave-then-rejoin yields a different entry.
    pub fn is_same_entry(&self, other: &WaitQueueEntry) -> bool {
        self.user_id == other.user_id && self.joined_at == other.joined_at
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    pub fn mark_matched(&mut self) -> Result<(), ModelError> {
        self.transition(QueueStatus::Matched)
    }

    pub fn mark_cancelled(&mut self) -> Result<(), ModelError> {
        self.transition(QueueStatus::Cancelled)
    }

    fn transition(&mut self, to: QueueStatus) -> Result<(), ModelError> {
        if self.status != QueueStatus::Waiting {
            return Err(ModelError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Answer to a status poll from a waiting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePosition {
    /// Number of waiting users ahead of this one.
    pub position: usize,
    pub estimated_wait_seconds: u64,
}

impl QueuePosition {
    pub fn new(position: usize, queue_length: usize) -> Self {
        let estimated = (queue_length as u64).saturating_mul(WAIT_SECONDS_PER_ENTRY);
        QueuePosition {
            position,
            estimated_wait_seconds: estimated.max(WAIT_SECONDS_PER_ENTRY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_waiting_and_fresh() {
        let entry = WaitQueueEntry::new("user-1", Preferences::default());

        assert_eq!(entry.user_id, "user-1");
        assert!(entry.is_waiting());
        assert_eq!(entry.joined_at, entry.last_activity_at);
        assert!(entry.is_fresh(Utc::now(), TimeDelta::minutes(5)));
    }

    #[test]
    fn test_entry_goes_stale_after_window() {
        let mut entry = WaitQueueEntry::new("user-1", Preferences::default());
        let now = Utc::now();
        entry.last_activity_at = now - TimeDelta::minutes(6);

        assert!(!entry.is_fresh(now, TimeDelta::minutes(5)));

        entry.touch(now);
        assert!(entry.is_fresh(now, TimeDelta::minutes(5)));
    }

    #[test]
    fn test_rejoin_is_a_different_entry() {
        let original = WaitQueueEntry::new("user-1", Preferences::default());
        let mut touched = original.clone();
        touched.touch(Utc::now() + TimeDelta::seconds(10));
        let mut rejoined = original.clone();
        rejoined.joined_at = original.joined_at + TimeDelta::seconds(1);

        assert!(original.is_same_entry(&touched));
        assert!(!original.is_same_entry(&rejoined));
    }

    #[test]
    fn test_freshness_boundary_is_inclusive() {
        let mut entry = WaitQueueEntry::new("user-1", Preferences::default());
        let now = Utc::now();
        entry.last_activity_at = now - TimeDelta::minutes(5);

        assert!(entry.is_fresh(now, TimeDelta::minutes(5)));
    }

    #[test]
    fn test_status_transitions_are_terminal() {
        let mut entry = WaitQueueEntry::new("user-1", Preferences::default());
        entry.mark_matched().unwrap();
        assert_eq!(entry.status, QueueStatus::Matched);

        let err = entry.mark_cancelled().unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidTransition {
                from: "matched".to_string(),
                to: "cancelled".to_string()
            }
        );

        let mut other = WaitQueueEntry::new("user-2", Preferences::default());
        other.mark_cancelled().unwrap();
        assert!(other.mark_matched().is_err());
    }

    #[test]
    fn test_gender_filter_accepts() {
        assert!(GenderFilter::Any.accepts(None));
        assert!(GenderFilter::Any.accepts(Some(Gender::Female)));
        assert!(GenderFilter::Male.accepts(Some(Gender::Male)));
        assert!(!GenderFilter::Male.accepts(Some(Gender::Female)));
        assert!(!GenderFilter::Female.accepts(None));
    }

    #[test]
    fn test_age_range_overlap() {
        let a = AgeRange::new(18, 25).unwrap();
        let b = AgeRange::new(25, 40).unwrap();
        let c = AgeRange::new(26, 40).unwrap();

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(AgeRange::new(30, 20).is_err());
    }

    #[test]
    fn test_shared_interests_ignores_case() {
        let mine = Preferences {
            interests: vec!["Music".to_string(), "hiking".to_string()],
            ..Preferences::default()
        };
        let theirs = Preferences {
            interests: vec!["music".to_string(), "films".to_string()],
            ..Preferences::default()
        };

        assert_eq!(mine.shared_interests(&theirs), vec!["Music".to_string()]);
    }

    #[test]
    fn test_queue_position_estimate_has_floor() {
        assert_eq!(QueuePosition::new(0, 0).estimated_wait_seconds, 30);
        assert_eq!(QueuePosition::new(0, 1).estimated_wait_seconds, 30);
        assert_eq!(QueuePosition::new(3, 4).estimated_wait_seconds, 120);
    }

    #[test]
    fn test_preferences_deserialize_with_defaults() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"gender_filter":"female","gender":"male"}"#).unwrap();

        assert_eq!(prefs.gender_filter, GenderFilter::Female);
        assert_eq!(prefs.gender, Some(Gender::Male));
        assert_eq!(prefs.language, "en");
        assert_eq!(prefs.age_range, AgeRange::default());
    }

    #[test]
    fn test_entry_serialization_roundtrip() {
        let entry = WaitQueueEntry::new("user-1", Preferences::default());

        let serialized = serde_json::to_string(&entry).unwrap();
        assert!(serialized.contains("\"status\":\"waiting\""));
        assert!(!serialized.contains("\"gender\":"));

        let deserialized: WaitQueueEntry = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, entry);
    }
}
