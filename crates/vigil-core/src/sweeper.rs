//! Rolling-window maintenance.
//!
//! The sweeper is the only component allowed to remove counter state, and
//! it only removes entries older than the rolling window. It is scheduled
//! externally; running it twice with no new data changes nothing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::category::SafetyCategory;
use crate::store::{CounterStore, StoreError, UserId};

/// Retention period for per-category hits and timestamps, in days.
pub const ROLLING_WINDOW_DAYS: i64 = 30;

/// Summary of one sweep run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Users whose documents were examined.
    pub users_swept: usize,
    /// Total entries removed across all categories.
    pub removed: u64,
    /// Removal counts per category, in taxonomy order.
    pub removed_by_category: Vec<(SafetyCategory, u64)>,
}

impl SweepReport {
    fn add(&mut self, category: SafetyCategory, removed: u64) {
        if removed == 0 {
            return;
        }
        self.removed += removed;
        match self
            .removed_by_category
            .iter_mut()
            .find(|(c, _)| *c == category)
        {
            Some((_, count)) => *count += removed,
            None => self.removed_by_category.push((category, removed)),
        }
    }

    fn merge(&mut self, other: SweepReport) {
        self.users_swept += other.users_swept;
        for (category, removed) in other.removed_by_category {
            self.add(category, removed);
        }
    }
}

/// Periodic pruner for expired counter entries.
pub struct MaintenanceSweeper {
    store: Arc<dyn CounterStore>,
    window: Duration,
}

impl MaintenanceSweeper {
    /// Creates a sweeper with the standard 30-day window.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            window: Duration::days(ROLLING_WINDOW_DAYS),
        }
    }

    /// Creates a sweeper with a custom window, for tests and tooling.
    pub fn with_window(store: Arc<dyn CounterStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// The cutoff instant for a sweep starting at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    /// Prunes one user's expired entries, one atomic operation per
    /// category. Idempotent: a repeat run removes nothing further.
    pub fn sweep_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, StoreError> {
        let cutoff = self.cutoff(now);
        let mut report = SweepReport {
            users_swept: 1,
            ..Default::default()
        };

        let Some(doc) = self.store.read_counter_document(user_id)? else {
            return Ok(report);
        };

        for (category, counter) in &doc.categories {
            if counter.timestamps.iter().all(|ts| *ts >= cutoff) {
                continue;
            }
            let removed = self.store.prune_before(user_id, *category, cutoff)?;
            report.add(*category, removed);
        }

        if report.removed > 0 {
            debug!(user = %user_id, removed = report.removed, "pruned expired counter entries");
        }
        Ok(report)
    }

    /// Sweeps every user known to the store. Per-user failures are logged
    /// and skipped so one bad document cannot stall the sweep.
    pub fn sweep_all(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();

        for user_id in self.store.user_ids()? {
            match self.sweep_user(&user_id, now) {
                Ok(user_report) => report.merge(user_report),
                Err(err) => {
                    warn!(user = %user_id, error = %err, "sweep failed for user, skipping");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::MemoryCounterStore;
    use crate::store::CounterStore;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn store_with_hits() -> (Arc<MemoryCounterStore>, UserId) {
        let store = Arc::new(MemoryCounterStore::new());
        let user = UserId::from("u-sweep");
        // One stale toxicity hit (day 1) and one fresh (day 28); one fresh
        // scam hit.
        store
            .increment_counters(&user, &[SafetyCategory::Toxicity], ts(1))
            .unwrap();
        store
            .increment_counters(&user, &[SafetyCategory::Toxicity], ts(28))
            .unwrap();
        store
            .increment_counters(&user, &[SafetyCategory::Scam], ts(28))
            .unwrap();
        (store, user)
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let (store, user) = store_with_hits();
        let sweeper = MaintenanceSweeper::new(store.clone() as Arc<dyn CounterStore>);

        // Day 40: the day-1 hit is 39 days old, the day-28 hits are inside
        // the window.
        let report = sweeper.sweep_user(&user, ts(10) + Duration::days(30)).unwrap();

        assert_eq!(report.removed, 1);
        assert_eq!(
            report.removed_by_category,
            vec![(SafetyCategory::Toxicity, 1)]
        );

        let doc = store.document(&user).unwrap();
        let toxicity = doc.categories.get(&SafetyCategory::Toxicity).unwrap();
        assert_eq!(toxicity.hits_30d, 1);
        assert_eq!(toxicity.timestamps.len(), 1);
        let scam = doc.categories.get(&SafetyCategory::Scam).unwrap();
        assert_eq!(scam.hits_30d, 1);
        assert_eq!(doc.total_flags_30d, 2);
    }

    #[test]
    fn counter_matches_timestamps_after_sweep() {
        let (store, user) = store_with_hits();
        let sweeper = MaintenanceSweeper::new(store.clone() as Arc<dyn CounterStore>);

        sweeper.sweep_user(&user, ts(10) + Duration::days(30)).unwrap();

        let doc = store.document(&user).unwrap();
        for (category, counter) in &doc.categories {
            assert_eq!(
                counter.hits_30d as usize,
                counter.timestamps.len(),
                "{:?} diverged",
                category
            );
        }
    }

    #[test]
    fn sweep_is_idempotent() {
        let (store, user) = store_with_hits();
        let sweeper = MaintenanceSweeper::new(store.clone() as Arc<dyn CounterStore>);
        let now = ts(10) + Duration::days(30);

        let first = sweeper.sweep_user(&user, now).unwrap();
        assert_eq!(first.removed, 1);

        let second = sweeper.sweep_user(&user, now).unwrap();
        assert_eq!(second.removed, 0);
        assert_eq!(second.removed_by_category, vec![]);
    }

    #[test]
    fn sweep_unknown_user_is_a_noop() {
        let store = Arc::new(MemoryCounterStore::new());
        let sweeper = MaintenanceSweeper::new(store as Arc<dyn CounterStore>);
        let report = sweeper
            .sweep_user(&UserId::from("nobody"), ts(15))
            .unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(report.users_swept, 1);
    }

    #[test]
    fn sweep_all_covers_every_user() {
        let store = Arc::new(MemoryCounterStore::new());
        for user in ["a", "b"] {
            store
                .increment_counters(
                    &UserId::from(user),
                    &[SafetyCategory::Spam],
                    ts(1),
                )
                .unwrap();
        }
        let sweeper = MaintenanceSweeper::new(store.clone() as Arc<dyn CounterStore>);

        let report = sweeper.sweep_all(ts(10) + Duration::days(30)).unwrap();

        assert_eq!(report.users_swept, 2);
        assert_eq!(report.removed, 2);
    }

    #[test]
    fn custom_window_changes_cutoff() {
        let store = Arc::new(MemoryCounterStore::new());
        let sweeper =
            MaintenanceSweeper::with_window(store as Arc<dyn CounterStore>, Duration::days(7));
        assert_eq!(sweeper.cutoff(ts(15)), ts(8));
    }
}
