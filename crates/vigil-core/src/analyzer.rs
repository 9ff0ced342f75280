//! Content analysis: sentiment, pattern, context, and word-ratio passes.
//!
//! [`ContentAnalyzer::analyze`] is a pure function of the text and the
//! [`FilterConfig`]: it accumulates an unsafe-signal count across four
//! independent checks and maps it to a tri-state [`ContentSafetyVerdict`].
//! Sentiment, context, and word-ratio each contribute at most one unit;
//! the pattern pass contributes one unit per matched pattern family.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::lexicon::{CompiledLexicon, WordClass};

/// Strictness level controlling pattern tiers and profanity thresholds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum StrictnessLevel {
    /// Fewest patterns, 20% profanity-ratio threshold.
    Permissive = 1,
    /// Adds masking/abbreviation patterns, 10% threshold.
    #[default]
    Moderate = 2,
    /// Adds harassment/threat phrases, 5% threshold.
    Strict = 3,
}

impl StrictnessLevel {
    /// Returns all strictness levels, lowest first.
    pub fn all() -> &'static [StrictnessLevel] {
        &[
            StrictnessLevel::Permissive,
            StrictnessLevel::Moderate,
            StrictnessLevel::Strict,
        ]
    }

    /// The profanity-ratio threshold above which the word-ratio pass fires.
    pub fn profanity_threshold(self) -> f32 {
        match self {
            StrictnessLevel::Permissive => 0.20,
            StrictnessLevel::Moderate => 0.10,
            StrictnessLevel::Strict => 0.05,
        }
    }

    /// Returns a human-readable name for this level.
    pub fn name(self) -> &'static str {
        match self {
            StrictnessLevel::Permissive => "Permissive",
            StrictnessLevel::Moderate => "Moderate",
            StrictnessLevel::Strict => "Strict",
        }
    }
}

/// Analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Active strictness level.
    pub strictness: StrictnessLevel,
    /// Whether the sentiment pass runs.
    pub sentiment_enabled: bool,
    /// Whether the pattern pass runs.
    pub pattern_enabled: bool,
    /// Whether the context pass runs.
    pub context_enabled: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            strictness: StrictnessLevel::Moderate,
            sentiment_enabled: true,
            pattern_enabled: true,
            context_enabled: true,
        }
    }
}

impl FilterConfig {
    /// Creates a config at the given strictness with all passes enabled.
    pub fn with_strictness(strictness: StrictnessLevel) -> Self {
        Self {
            strictness,
            ..Default::default()
        }
    }
}

/// Tri-state content safety verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "reasons")]
pub enum ContentSafetyVerdict {
    /// No unsafe signals.
    Safe,
    /// Exactly one unsafe signal.
    Questionable(Vec<String>),
    /// Two or more unsafe signals.
    Unsafe(Vec<String>),
}

impl ContentSafetyVerdict {
    /// Derives the verdict from an unsafe-signal count and its reasons.
    pub fn from_signals(signals: usize, reasons: Vec<String>) -> Self {
        match signals {
            0 => ContentSafetyVerdict::Safe,
            1 => ContentSafetyVerdict::Questionable(reasons),
            _ => ContentSafetyVerdict::Unsafe(reasons),
        }
    }

    /// The reasons accumulated by the triggering passes.
    pub fn reasons(&self) -> &[String] {
        match self {
            ContentSafetyVerdict::Safe => &[],
            ContentSafetyVerdict::Questionable(reasons) => reasons,
            ContentSafetyVerdict::Unsafe(reasons) => reasons,
        }
    }

    /// Whether the verdict is `Safe`.
    pub fn is_safe(&self) -> bool {
        matches!(self, ContentSafetyVerdict::Safe)
    }
}

/// Outcome of the sentiment pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentScore {
    /// Raw score normalized by token count.
    pub normalized: f32,
    /// Whether the score exceeds the highly-negative threshold.
    pub is_highly_negative: bool,
}

/// Normalized-score threshold for the highly-negative flag.
const HIGHLY_NEGATIVE_THRESHOLD: f32 = 0.7;
/// Aggressive-word ratio above which the context pass fires.
const AGGRESSIVE_RATIO_THRESHOLD: f32 = 0.2;
/// Uppercase-character ratio for the excessive-caps heuristic.
const CAPS_RATIO_THRESHOLD: f32 = 0.5;
/// Minimum length for the excessive-caps heuristic to apply.
const CAPS_MIN_LEN: usize = 10;
/// Punctuation-character ratio for the excessive-punctuation heuristic.
const PUNCT_RATIO_THRESHOLD: f32 = 0.25;

/// Lexicon-driven content analyzer.
///
/// Stateless apart from its compiled lexicon; construct once and share.
#[derive(Clone)]
pub struct ContentAnalyzer {
    lexicon: Arc<CompiledLexicon>,
}

impl ContentAnalyzer {
    /// Creates an analyzer over the given compiled lexicon.
    pub fn new(lexicon: Arc<CompiledLexicon>) -> Self {
        Self { lexicon }
    }

    /// Creates an analyzer over the built-in lexicon.
    pub fn with_builtin() -> Self {
        Self::new(Arc::new(CompiledLexicon::builtin()))
    }

    /// The compiled lexicon this analyzer runs against.
    pub fn lexicon(&self) -> &Arc<CompiledLexicon> {
        &self.lexicon
    }

    /// Analyzes `text` and returns the tri-state verdict.
    ///
    /// Pure and infallible: empty or degenerate input yields `Safe`.
    pub fn analyze(&self, text: &str, config: &FilterConfig) -> ContentSafetyVerdict {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();

        let mut signals = 0usize;
        let mut reasons = Vec::new();

        if config.sentiment_enabled {
            let sentiment = self.score_sentiment(&words);
            if sentiment.is_highly_negative {
                signals += 1;
                reasons.push(format!(
                    "highly negative sentiment (score {:.2})",
                    sentiment.normalized
                ));
            }
        }

        if config.pattern_enabled {
            // Each matched family is its own unsafe signal.
            for reason in self.match_patterns(&lowered, config.strictness) {
                signals += 1;
                reasons.push(reason);
            }
        }

        if config.context_enabled {
            let context_reasons = self.context_flags(text, &words);
            if !context_reasons.is_empty() {
                signals += 1;
                reasons.extend(context_reasons);
            }
        }

        if let Some(reason) = self.profanity_ratio_flag(&lowered, config.strictness) {
            signals += 1;
            reasons.push(reason);
        }

        ContentSafetyVerdict::from_signals(signals, reasons)
    }

    /// Returns true iff `analyze` yields `Safe` for this text.
    pub fn is_safe_content(&self, text: &str, config: &FilterConfig) -> bool {
        self.analyze(text, config).is_safe()
    }

    /// Scores sentiment over whitespace-split lowercase words.
    ///
    /// Negative-list words add 1.0, positive-list words subtract 0.5; the
    /// sum is normalized by total token count.
    pub fn score_sentiment(&self, words: &[&str]) -> SentimentScore {
        if words.is_empty() {
            return SentimentScore {
                normalized: 0.0,
                is_highly_negative: false,
            };
        }

        let mut score = 0.0f32;
        for word in words {
            let stripped = trim_word(word);
            if self.lexicon.is_negative(stripped) {
                score += 1.0;
            } else if self.lexicon.is_positive(stripped) {
                score -= 0.5;
            }
        }

        let normalized = score / words.len() as f32;
        SentimentScore {
            normalized,
            is_highly_negative: normalized > HIGHLY_NEGATIVE_THRESHOLD,
        }
    }

    /// Runs the tier-selected pattern families and returns one reason per
    /// matched family.
    pub fn match_patterns(&self, lowered: &str, strictness: StrictnessLevel) -> Vec<String> {
        self.lexicon
            .families_for(strictness)
            .filter_map(|family| {
                family
                    .find_match(lowered)
                    .map(|matched| format!("{} ({})", family.reason(), matched))
            })
            .collect()
    }

    /// Context heuristics: aggressive verbs/adjectives, excessive caps,
    /// excessive punctuation. Returns the reasons for every heuristic that
    /// fired; an empty vec means the pass is not suspicious.
    pub fn context_flags(&self, text: &str, words: &[&str]) -> Vec<String> {
        let mut reasons = Vec::new();

        if !words.is_empty() {
            let aggressive = words
                .iter()
                .filter(|w| {
                    matches!(
                        self.lexicon.aggressive_class(trim_word(w)),
                        Some(WordClass::Verb) | Some(WordClass::Adjective)
                    )
                })
                .count();
            let ratio = aggressive as f32 / words.len() as f32;
            if ratio > AGGRESSIVE_RATIO_THRESHOLD {
                reasons.push(format!("aggressive language detected (ratio {:.2})", ratio));
            }
        }

        let total = text.chars().count();
        if total > CAPS_MIN_LEN {
            let upper = text.chars().filter(|c| c.is_uppercase()).count();
            if upper as f32 / total as f32 > CAPS_RATIO_THRESHOLD {
                reasons.push("excessive capitalization".to_string());
            }
        }

        if total > 0 {
            let punct = text.chars().filter(|c| c.is_ascii_punctuation()).count();
            if punct as f32 / total as f32 > PUNCT_RATIO_THRESHOLD {
                reasons.push("excessive punctuation".to_string());
            }
        }

        reasons
    }

    /// Word-ratio pass: profane tokens over total letters-only tokens,
    /// flagged when the ratio exceeds the strictness threshold.
    pub fn profanity_ratio_flag(
        &self,
        lowered: &str,
        strictness: StrictnessLevel,
    ) -> Option<String> {
        let tokens: Vec<&str> = letter_tokens(lowered).collect();
        if tokens.is_empty() {
            return None;
        }

        let profane = tokens
            .iter()
            .filter(|t| self.lexicon.is_profane(t, strictness))
            .count();
        let ratio = profane as f32 / tokens.len() as f32;
        let threshold = strictness.profanity_threshold();

        if ratio > threshold {
            Some(format!(
                "profanity ratio {:.2} exceeds threshold {:.2}",
                ratio, threshold
            ))
        } else {
            None
        }
    }

    /// Masks every profane token with `replacement`, preserving whitespace
    /// and token order.
    ///
    /// Single left-to-right scan over the original byte offsets, with an
    /// offset correction as replacement length differs from token length.
    /// Idempotent on already-clean text.
    pub fn clean_text(&self, text: &str, replacement: &str, strictness: StrictnessLevel) -> String {
        let mut out = text.to_string();
        let mut offset = 0isize;

        for (start, end) in token_ranges(text) {
            let token = text[start..end].to_lowercase();
            if self.lexicon.is_profane(&token, strictness) {
                let s = (start as isize + offset) as usize;
                let e = (end as isize + offset) as usize;
                out.replace_range(s..e, replacement);
                offset += replacement.len() as isize - (end - start) as isize;
            }
        }

        out
    }
}

/// Strips leading/trailing non-alphabetic characters from a token.
fn trim_word(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphabetic())
}

/// Iterates letters-only tokens of already-lowercased text.
fn letter_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
}

/// Byte ranges of maximal alphabetic runs in `text`.
fn token_ranges(text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c.is_alphabetic() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            ranges.push((s, i));
        }
    }
    if let Some(s) = start {
        ranges.push((s, text.len()));
    }

    ranges
}
