//! Vigil Core - Safety-signal detection and moderation counting.
//!
//! This crate inspects user-generated text (and, through an external
//! classifier, images) for unsafe content categories, converts detections
//! into privacy-preserving rolling counters, and escalates high-severity
//! findings for human review. It never blocks or alters the sending flow:
//! evaluation runs off the caller's critical path and fails silently.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_core::{CounterStore, SafetySignalEngine, UserId};
//!
//! # fn open_store() -> Arc<dyn CounterStore> { unimplemented!() }
//! # async fn demo() {
//! let store: Arc<dyn CounterStore> = open_store();
//! let engine = Arc::new(SafetySignalEngine::new(store));
//!
//! // Fire-and-forget after a message has been accepted for send.
//! let _ = engine.dispatch("message text".to_string(), UserId::from("user-17"));
//! # }
//! ```

pub mod analyzer;
pub mod category;
pub mod detectors;
pub mod lexicon;
pub mod mapper;
pub mod orchestrator;
pub mod store;
pub mod sweeper;

pub use analyzer::{ContentAnalyzer, ContentSafetyVerdict, FilterConfig, StrictnessLevel};
pub use category::{CategoryFamily, CategoryMeta, SafetyCategory};
pub use detectors::{
    ChildSafetyDetector, DetectionResult, ExtremismDetector, PhraseHit, SecurityThreatDetector,
};
pub use lexicon::{CompiledLexicon, LexiconError, PatternFamily, PatternTier, SignalLexicon};
pub use mapper::map_reasons_to_categories;
pub use orchestrator::{
    category_for_image_label, ClassifierError, ImageClassifier, ImageLabel, SafetySignalEngine,
};
pub use store::{
    CategoryCounter, CounterDocument, CounterStore, EscalationRecord, EscalationSeverity,
    ReviewPriority, StoreError, UserId,
};
pub use sweeper::{MaintenanceSweeper, SweepReport, ROLLING_WINDOW_DAYS};
