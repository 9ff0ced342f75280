//! Counter/escalation store contract.
//!
//! The engine produces counter increments, review flags, and escalation
//! records; a store implementation persists them. The contract is built
//! around atomic increment-by-N / append primitives: the engine never
//! read-modify-writes a counter, so concurrent evaluations of one user's
//! messages never lose updates.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::category::SafetyCategory;

/// Opaque user identifier the counter store is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Manual-review priority recorded on a user's safety record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPriority {
    /// Routine review queue.
    Standard,
    /// Front of the review queue; the engine uses this for every
    /// high-severity detection.
    High,
}

impl ReviewPriority {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewPriority::Standard => "standard",
            ReviewPriority::High => "high",
        }
    }

    /// Parses from the database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(ReviewPriority::Standard),
            "high" => Some(ReviewPriority::High),
            _ => None,
        }
    }
}

/// Severity marker on escalation records. Escalations are only ever created
/// for high-severity categories, so the marker is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationSeverity {
    High,
}

impl EscalationSeverity {
    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        "high"
    }
}

/// Write-once escalation record for human review.
///
/// Never contains the offending content; only its length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// The user whose content triggered the escalation.
    pub user_id: UserId,
    /// The triggering category set.
    pub categories: Vec<SafetyCategory>,
    /// When the detection happened.
    pub timestamp: DateTime<Utc>,
    /// Fixed high-severity marker.
    pub severity: EscalationSeverity,
    /// Character count of the analyzed content.
    pub content_length: usize,
}

impl EscalationRecord {
    /// Creates an escalation record with the fixed high-severity marker.
    pub fn new(
        user_id: UserId,
        categories: Vec<SafetyCategory>,
        timestamp: DateTime<Utc>,
        content_length: usize,
    ) -> Self {
        Self {
            user_id,
            categories,
            timestamp,
            severity: EscalationSeverity::High,
            content_length,
        }
    }
}

/// Rolling-window counter state for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCounter {
    /// Hits inside the 30-day rolling window.
    pub hits_30d: i64,
    /// Timestamps of those hits.
    pub timestamps: Vec<DateTime<Utc>>,
}

/// A user's counter document, as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterDocument {
    /// The user this document belongs to.
    pub user_id: UserId,
    /// Aggregate flags inside the rolling window.
    pub total_flags_30d: i64,
    /// Timestamp of the most recent flag.
    pub last_flag_at: Option<DateTime<Utc>>,
    /// Per-category counters, keyed in taxonomy order.
    pub categories: BTreeMap<SafetyCategory, CategoryCounter>,
    /// Whether the user is flagged for manual review.
    pub flagged_for_review: bool,
    /// When the review flag was set.
    pub flag_timestamp: Option<DateTime<Utc>>,
    /// Categories recorded on the review flag.
    pub flag_categories: Vec<SafetyCategory>,
    /// Review priority, if flagged.
    pub review_priority: Option<ReviewPriority>,
}

impl CounterDocument {
    /// Creates an empty document for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_flags_30d: 0,
            last_flag_at: None,
            categories: BTreeMap::new(),
            flagged_for_review: false,
            flag_timestamp: None,
            flag_categories: Vec::new(),
            review_priority: None,
        }
    }

    /// Renders the document with the store field-name contract:
    /// `<id>_hits_30d`, `<id>_timestamps`, `total_flags_30d`,
    /// `last_flag_at`, `flagged_for_review`, `flag_timestamp`,
    /// `flag_categories`, `review_priority`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut doc = serde_json::Map::new();
        doc.insert("total_flags_30d".into(), json!(self.total_flags_30d));
        doc.insert(
            "last_flag_at".into(),
            json!(self.last_flag_at.map(|t| t.to_rfc3339())),
        );
        doc.insert("flagged_for_review".into(), json!(self.flagged_for_review));
        doc.insert(
            "flag_timestamp".into(),
            json!(self.flag_timestamp.map(|t| t.to_rfc3339())),
        );
        doc.insert(
            "flag_categories".into(),
            json!(self
                .flag_categories
                .iter()
                .map(|c| c.id())
                .collect::<Vec<_>>()),
        );
        doc.insert(
            "review_priority".into(),
            json!(self.review_priority.map(|p| p.as_str())),
        );

        for (category, counter) in &self.categories {
            doc.insert(category.counter_field(), json!(counter.hits_30d));
            doc.insert(
                category.timestamps_field(),
                json!(counter
                    .timestamps
                    .iter()
                    .map(|t| t.to_rfc3339())
                    .collect::<Vec<_>>()),
            );
        }

        serde_json::Value::Object(doc)
    }
}

/// Errors surfaced by counter-store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// Serialization of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Wraps any displayable error as a backend failure.
    pub fn backend(err: impl fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Persistent, per-user counter and escalation store.
///
/// Implementations must make `increment_counters` and `prune_before` atomic
/// with respect to each other: concurrent increments never lose updates, and
/// pruning never leaves a counter diverging from its timestamp array.
pub trait CounterStore: Send + Sync {
    /// Atomically records one hit per category: per-category counter +1 and
    /// timestamp append, `total_flags_30d` increased by the category count,
    /// `last_flag_at` set to `timestamp`. One merge-write, not N.
    fn increment_counters(
        &self,
        user_id: &UserId,
        categories: &[SafetyCategory],
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Flags the user's safety record for manual review.
    fn flag_for_review(
        &self,
        user_id: &UserId,
        categories: &[SafetyCategory],
        priority: ReviewPriority,
    ) -> Result<(), StoreError>;

    /// Creates a write-once escalation record.
    fn create_escalation(&self, record: &EscalationRecord) -> Result<(), StoreError>;

    /// Reads a user's counter document; `None` if the user has no record.
    fn read_counter_document(&self, user_id: &UserId) -> Result<Option<CounterDocument>, StoreError>;

    /// Atomically removes timestamps older than `cutoff` for one category
    /// and decrements that category's counter (and `total_flags_30d`) by the
    /// number removed. Returns the removal count.
    fn prune_before(
        &self,
        user_id: &UserId,
        category: SafetyCategory,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// All user ids with counter state, for maintenance sweeps.
    fn user_ids(&self) -> Result<Vec<UserId>, StoreError>;
}
