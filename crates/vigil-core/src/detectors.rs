//! Specialized high-precision detectors.
//!
//! These passes run unconditionally, at maximum sensitivity, regardless of
//! the configured strictness: the categories they emit are (with the
//! exception of extremism) high severity, and lowering their sensitivity is
//! never acceptable. Detection is plain substring containment against
//! lowercased text.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::category::SafetyCategory;
use crate::lexicon::CompiledLexicon;

/// A single phrase hit from a specialized detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseHit {
    /// The category this phrase maps to.
    pub category: SafetyCategory,
    /// The phrase that matched.
    pub phrase: String,
}

impl PhraseHit {
    fn new(category: SafetyCategory, phrase: &str) -> Self {
        Self {
            category,
            phrase: phrase.to_string(),
        }
    }
}

/// Result of a detection pass over one piece of content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Deduplicated categories found.
    pub categories: Vec<SafetyCategory>,
    /// Aggregate confidence (surfaced for calibration, never branched on).
    pub confidence: f32,
    /// Freeform reasons describing what fired.
    pub reasons: Vec<String>,
    /// True iff any category in the set is high severity.
    pub requires_escalation: bool,
}

impl DetectionResult {
    /// Builds a result, deriving `requires_escalation` from the categories.
    pub fn new(categories: Vec<SafetyCategory>, confidence: f32, reasons: Vec<String>) -> Self {
        let requires_escalation = categories.iter().any(|c| c.is_high_severity());
        Self {
            categories,
            confidence: confidence.clamp(0.0, 1.0),
            reasons,
            requires_escalation,
        }
    }

    /// An empty (nothing detected) result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any category was detected.
    pub fn has_detections(&self) -> bool {
        !self.categories.is_empty()
    }
}

/// Scans one phrase list, emitting a hit per matched phrase.
fn scan_phrases(lowered: &str, phrases: &[String], category: SafetyCategory) -> Vec<PhraseHit> {
    phrases
        .iter()
        .filter(|phrase| lowered.contains(phrase.as_str()))
        .map(|phrase| PhraseHit::new(category, phrase))
        .collect()
}

/// Detector for child-safety phrase families.
#[derive(Clone)]
pub struct ChildSafetyDetector {
    lexicon: Arc<CompiledLexicon>,
}

impl ChildSafetyDetector {
    /// Creates a detector over the given lexicon.
    pub fn new(lexicon: Arc<CompiledLexicon>) -> Self {
        Self { lexicon }
    }

    /// Detects exploitation-indicator and grooming-pattern phrases.
    pub fn detect(&self, text: &str) -> Vec<PhraseHit> {
        let lowered = text.to_lowercase();
        let mut hits = scan_phrases(
            &lowered,
            self.lexicon.child_exploitation_phrases(),
            SafetyCategory::ChildExploitation,
        );
        hits.extend(scan_phrases(
            &lowered,
            self.lexicon.child_grooming_phrases(),
            SafetyCategory::ChildGrooming,
        ));
        hits
    }
}

/// Detector for terrorism and security-threat phrase families.
#[derive(Clone)]
pub struct SecurityThreatDetector {
    lexicon: Arc<CompiledLexicon>,
}

impl SecurityThreatDetector {
    /// Creates a detector over the given lexicon.
    pub fn new(lexicon: Arc<CompiledLexicon>) -> Self {
        Self { lexicon }
    }

    /// Detects terrorism, incitement, and weapon-trafficking phrases.
    pub fn detect(&self, text: &str) -> Vec<PhraseHit> {
        let lowered = text.to_lowercase();
        let mut hits = scan_phrases(
            &lowered,
            self.lexicon.terrorism_phrases(),
            SafetyCategory::TerrorismContent,
        );
        hits.extend(scan_phrases(
            &lowered,
            self.lexicon.incitement_phrases(),
            SafetyCategory::ViolenceIncitement,
        ));
        hits.extend(scan_phrases(
            &lowered,
            self.lexicon.weapon_phrases(),
            SafetyCategory::WeaponTrafficking,
        ));
        hits
    }
}

/// Detector for extremist-ideology phrases.
#[derive(Clone)]
pub struct ExtremismDetector {
    lexicon: Arc<CompiledLexicon>,
}

impl ExtremismDetector {
    /// Creates a detector over the given lexicon.
    pub fn new(lexicon: Arc<CompiledLexicon>) -> Self {
        Self { lexicon }
    }

    /// Detects extremist phrases; at most one category is emitted.
    pub fn detect(&self, text: &str) -> Vec<PhraseHit> {
        let lowered = text.to_lowercase();
        scan_phrases(
            &lowered,
            self.lexicon.extremism_phrases(),
            SafetyCategory::Extremism,
        )
        .into_iter()
        .take(1)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Arc<CompiledLexicon> {
        Arc::new(CompiledLexicon::builtin())
    }

    #[test]
    fn grooming_phrases_detected() {
        let detector = ChildSafetyDetector::new(lexicon());
        let hits = detector.detect("Let's meet in person, don't tell your parents");
        assert!(hits
            .iter()
            .any(|h| h.category == SafetyCategory::ChildGrooming));
    }

    #[test]
    fn grooming_detection_is_case_insensitive() {
        let detector = ChildSafetyDetector::new(lexicon());
        let hits = detector.detect("KEEP THIS OUR SECRET");
        assert!(hits
            .iter()
            .any(|h| h.category == SafetyCategory::ChildGrooming));
    }

    #[test]
    fn exploitation_phrases_detected() {
        let detector = ChildSafetyDetector::new(lexicon());
        let hits = detector.detect("anyone selling cp links here");
        assert!(hits
            .iter()
            .any(|h| h.category == SafetyCategory::ChildExploitation));
    }

    #[test]
    fn security_families_map_to_distinct_categories() {
        let detector = SecurityThreatDetector::new(lexicon());

        let hits = detector.detect("planning a terrorist attack downtown");
        assert!(hits
            .iter()
            .any(|h| h.category == SafetyCategory::TerrorismContent));

        let hits = detector.detect("kill them all, every last one");
        assert!(hits
            .iter()
            .any(|h| h.category == SafetyCategory::ViolenceIncitement));

        let hits = detector.detect("I can sell you a gun, untraceable firearm");
        assert!(hits
            .iter()
            .any(|h| h.category == SafetyCategory::WeaponTrafficking));
    }

    #[test]
    fn extremism_emits_single_category() {
        let detector = ExtremismDetector::new(lexicon());
        let hits = detector.detect("white power now, racial holy war tomorrow");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, SafetyCategory::Extremism);
    }

    #[test]
    fn benign_text_yields_no_hits() {
        let lex = lexicon();
        let text = "Shall we get lunch tomorrow after the meeting?";
        assert!(ChildSafetyDetector::new(lex.clone()).detect(text).is_empty());
        assert!(SecurityThreatDetector::new(lex.clone())
            .detect(text)
            .is_empty());
        assert!(ExtremismDetector::new(lex).detect(text).is_empty());
    }

    #[test]
    fn detection_result_derives_escalation() {
        let result = DetectionResult::new(
            vec![SafetyCategory::Scam],
            0.8,
            vec!["scam pattern matched".into()],
        );
        assert!(!result.requires_escalation);

        let result = DetectionResult::new(
            vec![SafetyCategory::Scam, SafetyCategory::ChildGrooming],
            0.9,
            vec![],
        );
        assert!(result.requires_escalation);
    }

    #[test]
    fn detection_result_clamps_confidence() {
        let result = DetectionResult::new(vec![], 1.7, vec![]);
        assert_eq!(result.confidence, 1.0);
        assert!(!result.has_detections());
    }
}
