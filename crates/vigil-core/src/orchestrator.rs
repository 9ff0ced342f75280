//! Safety-signal orchestration.
//!
//! [`SafetySignalEngine`] is the async entry point: it runs the content
//! analyzer, maps verdict reasons onto categories, appends the specialized
//! detector passes, and drives counter updates and escalation through the
//! store. It is constructed once at process start and shared by reference;
//! there is no global instance.
//!
//! Evaluation is best-effort and silent-failure by design: it runs off the
//! caller's critical path, store failures are logged and never retried here,
//! and nothing is ever surfaced back to the message-send flow.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::analyzer::{ContentAnalyzer, FilterConfig};
use crate::category::SafetyCategory;
use crate::detectors::{
    ChildSafetyDetector, DetectionResult, ExtremismDetector, PhraseHit, SecurityThreatDetector,
};
use crate::lexicon::CompiledLexicon;
use crate::mapper::map_reasons_to_categories;
use crate::store::{CounterStore, EscalationRecord, ReviewPriority, UserId};

/// Confidence assigned to specialized phrase hits.
const PHRASE_HIT_CONFIDENCE: f32 = 0.95;
/// Confidence assigned to categories derived from analyzer reasons.
const MAPPED_REASON_CONFIDENCE: f32 = 0.6;

/// A label returned by an external image classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLabel {
    /// Classifier label id, e.g. `"nudity"`.
    pub label: String,
    /// Classifier confidence (0.0 to 1.0).
    pub confidence: f32,
}

impl ImageLabel {
    /// Creates a label.
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Errors from an external image classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No classifier backend is reachable.
    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    /// Classification ran and failed.
    #[error("classification failed: {0}")]
    Failed(String),
}

/// External pixel-level classifier boundary.
pub trait ImageClassifier: Send + Sync {
    /// Classifies image bytes into labels.
    fn classify(&self, bytes: &[u8]) -> Result<Vec<ImageLabel>, ClassifierError>;
}

/// Fixed classifier-label → category table for the image path.
const IMAGE_LABEL_MAP: &[(&str, SafetyCategory)] = &[
    ("nudity", SafetyCategory::SexualContent),
    ("explicit_nudity", SafetyCategory::SexualContent),
    ("sexual_activity", SafetyCategory::SexualContent),
    ("gore", SafetyCategory::GraphicViolence),
    ("graphic_violence", SafetyCategory::GraphicViolence),
    ("self_harm", SafetyCategory::SelfHarm),
    ("hate_symbol", SafetyCategory::HateSpeech),
    ("extremist_symbol", SafetyCategory::Extremism),
    ("csam", SafetyCategory::ChildExploitation),
    ("underage_subject", SafetyCategory::UnderageContent),
    ("terrorist_propaganda", SafetyCategory::TerrorismContent),
    ("weapon_sale", SafetyCategory::WeaponTrafficking),
];

/// Maps a classifier label to a category; unknown labels map to nothing.
pub fn category_for_image_label(label: &str) -> Option<SafetyCategory> {
    let lowered = label.to_lowercase();
    IMAGE_LABEL_MAP
        .iter()
        .find(|(id, _)| *id == lowered)
        .map(|(_, category)| *category)
}

/// The safety-signal orchestrator.
///
/// Holds the analyzer, the always-on specialized detectors, and the store;
/// construct once and share behind an [`Arc`].
pub struct SafetySignalEngine {
    analyzer: ContentAnalyzer,
    config: FilterConfig,
    child_safety: ChildSafetyDetector,
    security: SecurityThreatDetector,
    extremism: ExtremismDetector,
    store: Arc<dyn CounterStore>,
    image_classifier: Option<Arc<dyn ImageClassifier>>,
}

impl SafetySignalEngine {
    /// Creates an engine over the built-in lexicon with the default config.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_lexicon(
            Arc::new(CompiledLexicon::builtin()),
            FilterConfig::default(),
            store,
        )
    }

    /// Creates an engine over a specific lexicon and analyzer config.
    pub fn with_lexicon(
        lexicon: Arc<CompiledLexicon>,
        config: FilterConfig,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        Self {
            analyzer: ContentAnalyzer::new(Arc::clone(&lexicon)),
            config,
            child_safety: ChildSafetyDetector::new(Arc::clone(&lexicon)),
            security: SecurityThreatDetector::new(Arc::clone(&lexicon)),
            extremism: ExtremismDetector::new(lexicon),
            store,
            image_classifier: None,
        }
    }

    /// Attaches an external image classifier.
    pub fn with_image_classifier(mut self, classifier: Arc<dyn ImageClassifier>) -> Self {
        self.image_classifier = Some(classifier);
        self
    }

    /// The analyzer config in effect.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Runs the full detection pipeline without touching the store.
    ///
    /// The specialized detectors run unconditionally; the category set is
    /// the deduplicated union of the mapped analyzer reasons and every
    /// detector hit.
    pub fn evaluate_text_only(&self, text: &str) -> DetectionResult {
        let verdict = self.analyzer.analyze(text, &self.config);
        let mut reasons: Vec<String> = verdict.reasons().to_vec();

        let mapped = map_reasons_to_categories(&reasons);

        let mut hits: Vec<PhraseHit> = self.child_safety.detect(text);
        hits.extend(self.security.detect(text));
        hits.extend(self.extremism.detect(text));

        for hit in &hits {
            reasons.push(format!(
                "{} phrase matched ({})",
                hit.category.display_name(),
                hit.phrase
            ));
        }

        // Dedup: a category must never be counted twice for one message.
        let categories: Vec<SafetyCategory> = mapped
            .iter()
            .copied()
            .chain(hits.iter().map(|h| h.category))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let confidence = if categories.is_empty() {
            0.0
        } else if hits.is_empty() {
            MAPPED_REASON_CONFIDENCE
        } else {
            PHRASE_HIT_CONFIDENCE
        };

        DetectionResult::new(categories, confidence, reasons)
    }

    /// Evaluates a text message for a user, recording counters and
    /// escalations. Never fails; store errors are logged and swallowed.
    pub async fn evaluate(&self, text: &str, user_id: &UserId) {
        let result = self.evaluate_text_only(text);
        if !result.has_detections() {
            return;
        }
        self.record(user_id, &result, text.chars().count());
    }

    /// Evaluates an image for a user by delegating to the external
    /// classifier. Classifier absence or failure means no categories.
    pub async fn evaluate_image(&self, bytes: &[u8], user_id: &UserId) {
        let Some(classifier) = self.image_classifier.as_ref() else {
            debug!(user = %user_id, "no image classifier configured, skipping");
            return;
        };

        let labels = match classifier.classify(bytes) {
            Ok(labels) => labels,
            Err(err) => {
                warn!(user = %user_id, error = %err, "image classification failed, treating as clean");
                return;
            }
        };

        let categories: Vec<SafetyCategory> = labels
            .iter()
            .filter_map(|l| category_for_image_label(&l.label))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if categories.is_empty() {
            return;
        }

        let reasons = labels
            .iter()
            .map(|l| format!("image label {} ({:.2})", l.label, l.confidence))
            .collect();
        let confidence = labels
            .iter()
            .map(|l| l.confidence)
            .fold(0.0f32, f32::max);
        let result = DetectionResult::new(categories, confidence, reasons);

        self.record(user_id, &result, bytes.len());
    }

    /// Submits a text evaluation onto the runtime.
    ///
    /// The returned handle may be dropped for fire-and-forget dispatch; the
    /// task always runs to completion either way.
    pub fn dispatch(self: &Arc<Self>, text: String, user_id: UserId) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.evaluate(&text, &user_id).await;
        })
    }

    /// Submits an image evaluation onto the runtime.
    pub fn dispatch_image(self: &Arc<Self>, bytes: Vec<u8>, user_id: UserId) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.evaluate_image(&bytes, &user_id).await;
        })
    }

    /// Counter updates and escalation for a non-empty detection.
    ///
    /// Each failure is logged with enough context to retry later (user,
    /// categories, timestamp) and then dropped; retry is the store
    /// adapter's concern.
    fn record(&self, user_id: &UserId, result: &DetectionResult, content_length: usize) {
        let now = Utc::now();
        let ids: Vec<&str> = result.categories.iter().map(|c| c.id()).collect();

        if let Err(err) = self
            .store
            .increment_counters(user_id, &result.categories, now)
        {
            warn!(
                user = %user_id,
                categories = ?ids,
                timestamp = %now.to_rfc3339(),
                error = %err,
                "failed to record safety counters"
            );
        }

        if !result.requires_escalation {
            return;
        }

        let record = EscalationRecord::new(
            user_id.clone(),
            result.categories.clone(),
            now,
            content_length,
        );
        if let Err(err) = self.store.create_escalation(&record) {
            warn!(
                user = %user_id,
                categories = ?ids,
                timestamp = %now.to_rfc3339(),
                error = %err,
                "failed to create escalation record"
            );
        }

        if let Err(err) =
            self.store
                .flag_for_review(user_id, &result.categories, ReviewPriority::High)
        {
            warn!(
                user = %user_id,
                categories = ?ids,
                error = %err,
                "failed to flag user for review"
            );
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{BrokenClassifier, FixedClassifier, MemoryCounterStore};
    use super::*;
    use crate::analyzer::StrictnessLevel;

    fn engine_with_store() -> (Arc<SafetySignalEngine>, Arc<MemoryCounterStore>) {
        let store = Arc::new(MemoryCounterStore::new());
        let engine = Arc::new(SafetySignalEngine::new(
            store.clone() as Arc<dyn CounterStore>
        ));
        (engine, store)
    }

    #[tokio::test]
    async fn safe_text_writes_nothing() {
        let (engine, store) = engine_with_store();
        let user = UserId::from("u-safe");

        engine.evaluate("Nice weather today", &user).await;

        assert!(store.document(&user).is_none());
        assert!(store.escalations().is_empty());
    }

    #[tokio::test]
    async fn scam_text_increments_without_escalation() {
        let (engine, store) = engine_with_store();
        let user = UserId::from("u-scam");

        engine
            .evaluate(
                "Congratulations you won, click here to claim, wire transfer now",
                &user,
            )
            .await;

        let doc = store.document(&user).expect("counter document created");
        let scam = doc
            .categories
            .get(&SafetyCategory::Scam)
            .expect("scam counter present");
        assert_eq!(scam.hits_30d, 1);
        assert_eq!(scam.timestamps.len(), 1);
        assert_eq!(doc.total_flags_30d as usize, doc.categories.len());
        assert!(doc.last_flag_at.is_some());

        assert!(store.escalations().is_empty());
        assert!(!doc.flagged_for_review);
    }

    #[tokio::test]
    async fn grooming_text_escalates_with_content_length_only() {
        let (engine, store) = engine_with_store();
        let user = UserId::from("u-groom");
        let text = "Let's meet in person, don't tell your parents";

        engine.evaluate(text, &user).await;

        let escalations = store.escalations();
        assert_eq!(escalations.len(), 1);
        let record = &escalations[0];
        assert!(record.categories.contains(&SafetyCategory::ChildGrooming));
        assert_eq!(record.content_length, text.chars().count());
        let json = serde_json::to_string(record).unwrap();
        assert!(!json.contains("meet in person"));

        let doc = store.document(&user).unwrap();
        assert!(doc.flagged_for_review);
        assert_eq!(doc.review_priority, Some(ReviewPriority::High));
        assert!(doc
            .categories
            .contains_key(&SafetyCategory::ChildGrooming));
    }

    #[tokio::test]
    async fn detectors_run_under_any_strictness() {
        let store = Arc::new(MemoryCounterStore::new());
        let text = "Let's meet in person, don't tell your parents";

        let mut results = Vec::new();
        for strictness in StrictnessLevel::all() {
            let engine = SafetySignalEngine::with_lexicon(
                Arc::new(CompiledLexicon::builtin()),
                FilterConfig::with_strictness(*strictness),
                store.clone() as Arc<dyn CounterStore>,
            );
            let result = engine.evaluate_text_only(text);
            results.push(result.categories);
        }

        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
        assert!(results[0].contains(&SafetyCategory::ChildGrooming));
    }

    #[tokio::test]
    async fn categories_are_deduplicated_before_counting() {
        let (engine, store) = engine_with_store();
        let user = UserId::from("u-dedup");

        // Caps and aggressive-word heuristics both map to harassment.
        engine
            .evaluate("I HATE YOU STUPID STUPID FOOL RIGHT NOW", &user)
            .await;

        let doc = store.document(&user).unwrap();
        let harassment = doc
            .categories
            .get(&SafetyCategory::Harassment)
            .expect("harassment counter present");
        assert_eq!(harassment.hits_30d, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_evaluations_never_under_count() {
        let (engine, store) = engine_with_store();
        let user = UserId::from("u-concurrent");
        let n = 16;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                engine.dispatch(
                    "Congratulations you won, wire transfer now".to_string(),
                    user.clone(),
                )
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let doc = store.document(&user).unwrap();
        let scam = doc.categories.get(&SafetyCategory::Scam).unwrap();
        assert_eq!(scam.hits_30d, n as i64);
        assert_eq!(scam.timestamps.len(), n);
    }

    #[tokio::test]
    async fn store_failures_never_propagate() {
        let (engine, store) = engine_with_store();
        let user = UserId::from("u-fail");
        store.fail_writes();

        // Both the counter path and the escalation path hit the failing
        // store; evaluate must still complete.
        engine
            .evaluate("Let's meet in person, don't tell your parents", &user)
            .await;

        assert!(store.escalations().is_empty());
    }

    #[tokio::test]
    async fn image_labels_map_to_categories() {
        let store = Arc::new(MemoryCounterStore::new());
        let classifier = Arc::new(FixedClassifier(vec![
            ImageLabel::new("gore", 0.91),
            ImageLabel::new("landscape", 0.99),
        ]));
        let engine = Arc::new(
            SafetySignalEngine::new(store.clone() as Arc<dyn CounterStore>)
                .with_image_classifier(classifier),
        );
        let user = UserId::from("u-image");

        engine.evaluate_image(&[0u8; 16], &user).await;

        let doc = store.document(&user).unwrap();
        assert!(doc
            .categories
            .contains_key(&SafetyCategory::GraphicViolence));
        assert_eq!(doc.categories.len(), 1);
    }

    #[tokio::test]
    async fn classifier_errors_mean_no_categories() {
        let store = Arc::new(MemoryCounterStore::new());
        let engine = Arc::new(
            SafetySignalEngine::new(store.clone() as Arc<dyn CounterStore>)
                .with_image_classifier(Arc::new(BrokenClassifier)),
        );
        let user = UserId::from("u-broken");

        engine.evaluate_image(&[0u8; 16], &user).await;

        assert!(store.document(&user).is_none());
    }

    #[tokio::test]
    async fn missing_classifier_skips_image_path() {
        let (engine, store) = engine_with_store();
        let user = UserId::from("u-noclassifier");

        engine.evaluate_image(&[0u8; 16], &user).await;

        assert!(store.document(&user).is_none());
    }

    #[test]
    fn unknown_image_labels_map_to_nothing() {
        assert_eq!(category_for_image_label("landscape"), None);
        assert_eq!(
            category_for_image_label("GORE"),
            Some(SafetyCategory::GraphicViolence)
        );
    }

    #[test]
    fn high_severity_image_label_requires_escalation() {
        let categories = vec![category_for_image_label("csam").unwrap()];
        let result = DetectionResult::new(categories, 0.99, vec![]);
        assert!(result.requires_escalation);
    }
}
