//! SQLite-backed counter/escalation store.
//!
//! Implements the `vigil-core` store contract with increment-in-place SQL:
//! counters move via `ON CONFLICT .. DO UPDATE SET hits_30d = hits_30d + 1`
//! and timestamp appends inside a single transaction per call, so concurrent
//! evaluations of the same user never lose updates, and pruning can never
//! leave a counter diverging from its timestamp rows.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use vigil_core::{
    CategoryCounter, CounterDocument, CounterStore, EscalationRecord, EscalationSeverity,
    ReviewPriority, SafetyCategory, StoreError, UserId,
};

use crate::error::{Result, StorageError};
use crate::schema::run_migrations;

/// SQLite implementation of the counter/escalation store contract.
#[derive(Clone)]
pub struct SqliteCounterStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCounterStore {
    /// Opens the store at the default app data path.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Opens (or creates) the store at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening counter store at: {:?}", path);
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// The default database path under the app data directory.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "vigil", "vigil")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("vigil.db"))
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Config("connection mutex poisoned".into()))
    }

    fn increment_inner(
        &self,
        user_id: &UserId,
        categories: &[SafetyCategory],
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if categories.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let ts = timestamp.to_rfc3339();

        for category in categories {
            tx.execute(
                "INSERT INTO category_counters (user_id, category, hits_30d)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT (user_id, category)
                 DO UPDATE SET hits_30d = hits_30d + 1",
                params![user_id.as_str(), category.id()],
            )?;
            tx.execute(
                "INSERT INTO category_timestamps (user_id, category, ts) VALUES (?1, ?2, ?3)",
                params![user_id.as_str(), category.id(), ts],
            )?;
        }

        tx.execute(
            "INSERT INTO user_flags (user_id, total_flags_30d, last_flag_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id)
             DO UPDATE SET total_flags_30d = total_flags_30d + ?2, last_flag_at = ?3",
            params![user_id.as_str(), categories.len() as i64, ts],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn flag_inner(
        &self,
        user_id: &UserId,
        categories: &[SafetyCategory],
        priority: ReviewPriority,
    ) -> Result<()> {
        let ids: Vec<&str> = categories.iter().map(|c| c.id()).collect();
        let categories_json = serde_json::to_string(&ids)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_flags
                 (user_id, flagged_for_review, flag_timestamp, flag_categories, review_priority)
             VALUES (?1, 1, ?2, ?3, ?4)
             ON CONFLICT (user_id)
             DO UPDATE SET flagged_for_review = 1,
                           flag_timestamp = ?2,
                           flag_categories = ?3,
                           review_priority = ?4",
            params![user_id.as_str(), now, categories_json, priority.as_str()],
        )?;

        Ok(())
    }

    fn escalation_inner(&self, record: &EscalationRecord) -> Result<()> {
        let ids: Vec<&str> = record.categories.iter().map(|c| c.id()).collect();
        let categories_json = serde_json::to_string(&ids)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO escalations (user_id, categories, severity, content_length, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id.as_str(),
                categories_json,
                record.severity.as_str(),
                record.content_length as i64,
                record.timestamp.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn read_inner(&self, user_id: &UserId) -> Result<Option<CounterDocument>> {
        let conn = self.conn()?;

        let flags = conn
            .query_row(
                "SELECT total_flags_30d, last_flag_at, flagged_for_review,
                        flag_timestamp, flag_categories, review_priority
                 FROM user_flags WHERE user_id = ?1",
                [user_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)? != 0,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((total, last_flag_at, flagged, flag_ts, flag_categories, priority)) = flags
        else {
            return Ok(None);
        };

        let mut doc = CounterDocument::new(user_id.clone());
        doc.total_flags_30d = total;
        doc.last_flag_at = last_flag_at.as_deref().map(parse_datetime).transpose()?;
        doc.flagged_for_review = flagged;
        doc.flag_timestamp = flag_ts.as_deref().map(parse_datetime).transpose()?;
        doc.flag_categories = parse_category_ids(&flag_categories)?;
        doc.review_priority = priority.as_deref().and_then(ReviewPriority::parse);

        let mut stmt = conn.prepare(
            "SELECT category, hits_30d FROM category_counters WHERE user_id = ?1",
        )?;
        let rows = stmt.query_map([user_id.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (category_id, hits) = row?;
            // Unknown ids (from a newer taxonomy) are skipped, not errors.
            if let Some(category) = SafetyCategory::from_id(&category_id) {
                doc.categories.insert(
                    category,
                    CategoryCounter {
                        hits_30d: hits,
                        timestamps: Vec::new(),
                    },
                );
            }
        }

        let mut stmt = conn.prepare(
            "SELECT category, ts FROM category_timestamps WHERE user_id = ?1 ORDER BY ts",
        )?;
        let rows = stmt.query_map([user_id.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (category_id, ts) = row?;
            if let Some(category) = SafetyCategory::from_id(&category_id) {
                doc.categories
                    .entry(category)
                    .or_default()
                    .timestamps
                    .push(parse_datetime(&ts)?);
            }
        }

        Ok(Some(doc))
    }

    fn prune_inner(
        &self,
        user_id: &UserId,
        category: SafetyCategory,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM category_timestamps
             WHERE user_id = ?1 AND category = ?2 AND ts < ?3",
            params![user_id.as_str(), category.id(), cutoff.to_rfc3339()],
        )? as u64;

        if removed > 0 {
            tx.execute(
                "UPDATE category_counters
                 SET hits_30d = MAX(hits_30d - ?3, 0)
                 WHERE user_id = ?1 AND category = ?2",
                params![user_id.as_str(), category.id(), removed as i64],
            )?;
            tx.execute(
                "UPDATE user_flags
                 SET total_flags_30d = MAX(total_flags_30d - ?2, 0)
                 WHERE user_id = ?1",
                params![user_id.as_str(), removed as i64],
            )?;
        }

        tx.commit()?;
        Ok(removed)
    }

    fn user_ids_inner(&self) -> Result<Vec<UserId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id FROM user_flags ORDER BY user_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    /// Escalation records for a user, oldest first. Consumed by review
    /// tooling; the engine itself never reads these back.
    pub fn escalations_for(&self, user_id: &UserId) -> Result<Vec<EscalationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT categories, content_length, created_at
             FROM escalations WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([user_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (categories_json, content_length, created_at) = row?;
            records.push(EscalationRecord {
                user_id: user_id.clone(),
                categories: parse_category_ids(&categories_json)?,
                timestamp: parse_datetime(&created_at)?,
                severity: EscalationSeverity::High,
                content_length: content_length as usize,
            });
        }
        Ok(records)
    }

    /// Total escalation records in the store.
    pub fn escalation_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM escalations", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl CounterStore for SqliteCounterStore {
    fn increment_counters(
        &self,
        user_id: &UserId,
        categories: &[SafetyCategory],
        timestamp: DateTime<Utc>,
    ) -> std::result::Result<(), StoreError> {
        self.increment_inner(user_id, categories, timestamp)
            .map_err(StoreError::from)
    }

    fn flag_for_review(
        &self,
        user_id: &UserId,
        categories: &[SafetyCategory],
        priority: ReviewPriority,
    ) -> std::result::Result<(), StoreError> {
        self.flag_inner(user_id, categories, priority)
            .map_err(StoreError::from)
    }

    fn create_escalation(&self, record: &EscalationRecord) -> std::result::Result<(), StoreError> {
        self.escalation_inner(record).map_err(StoreError::from)
    }

    fn read_counter_document(
        &self,
        user_id: &UserId,
    ) -> std::result::Result<Option<CounterDocument>, StoreError> {
        self.read_inner(user_id).map_err(StoreError::from)
    }

    fn prune_before(
        &self,
        user_id: &UserId,
        category: SafetyCategory,
        cutoff: DateTime<Utc>,
    ) -> std::result::Result<u64, StoreError> {
        self.prune_inner(user_id, category, cutoff)
            .map_err(StoreError::from)
    }

    fn user_ids(&self) -> std::result::Result<Vec<UserId>, StoreError> {
        self.user_ids_inner().map_err(StoreError::from)
    }
}

/// Parse an RFC 3339 datetime stored by this crate.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StorageError::Config(format!("invalid stored datetime '{s}': {err}")))
}

/// Parse a JSON array of category ids, skipping unknown ids.
fn parse_category_ids(json: &str) -> Result<Vec<SafetyCategory>> {
    let ids: Vec<String> = serde_json::from_str(json)?;
    Ok(ids
        .iter()
        .filter_map(|id| SafetyCategory::from_id(id))
        .collect())
}
