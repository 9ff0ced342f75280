//! Vigil Storage - SQLite persistence for the counter/escalation store.
//!
//! This crate implements the `vigil-core` store contract on SQLite:
//!
//! - 30-day rolling per-category hit counters (increment-in-place, never
//!   read-modify-write)
//! - per-hit timestamp rows pruned by the maintenance sweeper
//! - review flags and write-once, content-free escalation records
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_core::{CounterStore, SafetySignalEngine};
//! use vigil_storage::SqliteCounterStore;
//!
//! let store = Arc::new(SqliteCounterStore::new().unwrap());
//! let engine = SafetySignalEngine::new(store as Arc<dyn CounterStore>);
//! ```

pub mod error;
mod schema;
mod store;

pub use error::{Result, StorageError};
pub use schema::SCHEMA_VERSION;
pub use store::SqliteCounterStore;
