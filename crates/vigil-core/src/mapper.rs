//! Mapping analyzer reasons onto the category taxonomy.
//!
//! Best-effort, many-to-many keyword containment: a single reason may yield
//! several categories and several reasons may yield the same category. The
//! orchestrator deduplicates before any counter write.

use crate::category::SafetyCategory;

/// Keyword → category table checked against each reason, case-insensitively.
const REASON_KEYWORDS: &[(&str, SafetyCategory)] = &[
    ("threat", SafetyCategory::ViolentThreat),
    ("violence", SafetyCategory::ViolentThreat),
    ("harass", SafetyCategory::Harassment),
    ("aggressive", SafetyCategory::Harassment),
    ("capitalization", SafetyCategory::Harassment),
    ("profanity", SafetyCategory::Toxicity),
    ("negative sentiment", SafetyCategory::Toxicity),
    ("toxic", SafetyCategory::Toxicity),
    ("hate speech", SafetyCategory::HateSpeech),
    ("scam", SafetyCategory::Scam),
    ("phishing", SafetyCategory::Phishing),
    ("spam", SafetyCategory::Spam),
    ("punctuation", SafetyCategory::Spam),
    ("personal information", SafetyCategory::PrivacyViolation),
    ("doxx", SafetyCategory::Doxxing),
    ("self-harm", SafetyCategory::SelfHarm),
    ("self harm", SafetyCategory::SelfHarm),
    ("suicide", SafetyCategory::SuicideContent),
    ("sexual", SafetyCategory::SexualContent),
    ("explicit", SafetyCategory::SexualContent),
    ("graphic", SafetyCategory::GraphicViolence),
    ("gore", SafetyCategory::GraphicViolence),
];

/// Maps free-text reasons onto categories by keyword containment.
///
/// The result may contain duplicates; callers aggregating into counters
/// must deduplicate first.
pub fn map_reasons_to_categories(reasons: &[String]) -> Vec<SafetyCategory> {
    let mut categories = Vec::new();

    for reason in reasons {
        let lowered = reason.to_lowercase();
        for (keyword, category) in REASON_KEYWORDS {
            if lowered.contains(keyword) {
                categories.push(*category);
            }
        }
    }

    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasons(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_reasons_map_to_nothing() {
        assert!(map_reasons_to_categories(&[]).is_empty());
        assert!(map_reasons_to_categories(&reasons(&["all quiet"])).is_empty());
    }

    #[test]
    fn threat_and_violence_map_to_violent_threat() {
        let cats = map_reasons_to_categories(&reasons(&["threat phrase matched (watch your back)"]));
        assert!(cats.contains(&SafetyCategory::ViolentThreat));

        let cats = map_reasons_to_categories(&reasons(&["explicit violence described"]));
        assert!(cats.contains(&SafetyCategory::ViolentThreat));
    }

    #[test]
    fn mapping_is_case_insensitive() {
        let cats = map_reasons_to_categories(&reasons(&["SCAM pattern matched"]));
        assert!(cats.contains(&SafetyCategory::Scam));
    }

    #[test]
    fn one_reason_can_yield_multiple_categories() {
        let cats =
            map_reasons_to_categories(&reasons(&["aggressive threat with profanity detected"]));
        assert!(cats.contains(&SafetyCategory::ViolentThreat));
        assert!(cats.contains(&SafetyCategory::Harassment));
        assert!(cats.contains(&SafetyCategory::Toxicity));
    }

    #[test]
    fn duplicate_categories_are_preserved_for_caller_dedup() {
        let cats = map_reasons_to_categories(&reasons(&[
            "scam pattern matched (you won)",
            "scam pattern matched (wire transfer)",
        ]));
        assert_eq!(
            cats.iter()
                .filter(|c| **c == SafetyCategory::Scam)
                .count(),
            2
        );
    }

    #[test]
    fn analyzer_reason_strings_map_to_expected_categories() {
        let cats = map_reasons_to_categories(&reasons(&[
            "profanity ratio 0.33 exceeds threshold 0.10",
            "aggressive language detected (ratio 0.33)",
            "highly negative sentiment (score 0.81)",
        ]));
        assert!(cats.contains(&SafetyCategory::Toxicity));
        assert!(cats.contains(&SafetyCategory::Harassment));
    }
}
