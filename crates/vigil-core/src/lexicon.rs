//! Detection data: word lists, phrase lists, and tiered pattern families.
//!
//! Patterns and lexicons are data, the engine is logic over that data. The
//! [`SignalLexicon`] is a versioned, serde-loadable container so pattern
//! updates ship without rebuilding the detection code; [`SignalLexicon::builtin`]
//! provides the compiled-in default set, and [`CompiledLexicon`] holds the
//! precompiled regex families and indexed word sets the analyzer runs against.

use std::collections::{HashMap, HashSet};

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::StrictnessLevel;

/// Pattern tier, selected by strictness level.
///
/// Basic families are always active; moderate adds masking/abbreviation
/// obfuscation patterns; strict adds harassment/threat phrasing. Higher
/// strictness activates all lower tiers plus its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTier {
    /// Always active.
    Basic,
    /// Active at moderate strictness and above.
    Moderate,
    /// Active at strict strictness only.
    Strict,
}

impl PatternTier {
    /// Whether this tier is active at the given strictness level.
    pub fn active_at(self, strictness: StrictnessLevel) -> bool {
        match self {
            PatternTier::Basic => true,
            PatternTier::Moderate => strictness >= StrictnessLevel::Moderate,
            PatternTier::Strict => strictness >= StrictnessLevel::Strict,
        }
    }
}

/// Word class tag for aggressive-word entries.
///
/// The context pass only counts aggressive verbs and adjectives; tagging the
/// lexicon entries keeps that filter without a statistical tagger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordClass {
    Verb,
    Adjective,
}

/// An aggressive-word lexicon entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggressiveWord {
    pub word: String,
    pub class: WordClass,
}

impl AggressiveWord {
    fn new(word: &str, class: WordClass) -> Self {
        Self {
            word: word.to_string(),
            class,
        }
    }
}

/// A named family of regex patterns at one tier.
///
/// Each family contributes at most one unit to the unsafe-signal count per
/// analysis, regardless of how many of its patterns match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternFamily {
    /// Short name, e.g. `"scam"`.
    pub name: String,
    /// Tier gating when this family runs.
    pub tier: PatternTier,
    /// Reason string emitted when the family matches.
    pub reason: String,
    /// Regex patterns, matched against lowercased text.
    pub patterns: Vec<String>,
}

impl PatternFamily {
    fn new(name: &str, tier: PatternTier, reason: &str, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tier,
            reason: reason.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Versioned container for all detection data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalLexicon {
    /// Data version, bumped whenever the shipped lists change.
    pub version: u32,
    /// Negative sentiment words (+1.0 each).
    pub negative_words: Vec<String>,
    /// Positive sentiment words (-0.5 each).
    pub positive_words: Vec<String>,
    /// Profanity matched at every strictness level.
    pub profanity_base: Vec<String>,
    /// Additional profanity matched at moderate strictness and above.
    pub profanity_moderate: Vec<String>,
    /// Additional profanity matched at strict strictness only.
    pub profanity_strict: Vec<String>,
    /// Aggressive verbs/adjectives for the context pass.
    pub aggressive_words: Vec<AggressiveWord>,
    /// Tiered regex pattern families.
    pub pattern_families: Vec<PatternFamily>,
    /// Child-exploitation indicator phrases.
    pub child_exploitation_phrases: Vec<String>,
    /// Grooming-pattern phrases (secrecy, meetings, age probing).
    pub child_grooming_phrases: Vec<String>,
    /// Terrorist propaganda phrases.
    pub terrorism_phrases: Vec<String>,
    /// Violence-incitement phrases.
    pub incitement_phrases: Vec<String>,
    /// Weapon-trafficking phrases.
    pub weapon_phrases: Vec<String>,
    /// Extremist-ideology phrases.
    pub extremism_phrases: Vec<String>,
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl SignalLexicon {
    /// Builds the compiled-in default lexicon.
    pub fn builtin() -> Self {
        Self {
            version: 2,
            negative_words: strings(&[
                "hate", "stupid", "idiot", "dumb", "ugly", "loser", "pathetic", "worthless",
                "useless", "disgusting", "terrible", "awful", "horrible", "worst", "trash",
                "garbage", "moron", "annoying", "angry", "furious", "kill", "die", "miserable",
                "gross", "creep", "freak", "despise", "revolting", "vile", "scum",
            ]),
            positive_words: strings(&[
                "love", "happy", "great", "good", "wonderful", "amazing", "awesome", "nice",
                "kind", "excellent", "fantastic", "beautiful", "helpful", "friendly", "thanks",
                "thank", "congratulations", "fun", "excited", "proud", "brilliant", "lovely",
                "sweet", "cool", "glad",
            ]),
            profanity_base: strings(&[
                "fuck", "shit", "bitch", "cunt", "asshole", "bastard", "motherfucker", "dick",
                "pussy", "slut", "whore", "fucker", "fucking",
            ]),
            profanity_moderate: strings(&[
                "crap", "damn", "piss", "prick", "douche", "jackass", "stupid", "idiot",
                "moron", "wanker", "bullshit", "arse",
            ]),
            profanity_strict: strings(&[
                "dumb", "loser", "jerk", "suck", "sucks", "hell", "screw", "freaking", "darn",
                "butthead",
            ]),
            aggressive_words: vec![
                AggressiveWord::new("hate", WordClass::Verb),
                AggressiveWord::new("kill", WordClass::Verb),
                AggressiveWord::new("destroy", WordClass::Verb),
                AggressiveWord::new("attack", WordClass::Verb),
                AggressiveWord::new("hurt", WordClass::Verb),
                AggressiveWord::new("punch", WordClass::Verb),
                AggressiveWord::new("smash", WordClass::Verb),
                AggressiveWord::new("stab", WordClass::Verb),
                AggressiveWord::new("shoot", WordClass::Verb),
                AggressiveWord::new("beat", WordClass::Verb),
                AggressiveWord::new("crush", WordClass::Verb),
                AggressiveWord::new("slap", WordClass::Verb),
                AggressiveWord::new("strangle", WordClass::Verb),
                AggressiveWord::new("stupid", WordClass::Adjective),
                AggressiveWord::new("dumb", WordClass::Adjective),
                AggressiveWord::new("pathetic", WordClass::Adjective),
                AggressiveWord::new("worthless", WordClass::Adjective),
                AggressiveWord::new("disgusting", WordClass::Adjective),
                AggressiveWord::new("ugly", WordClass::Adjective),
                AggressiveWord::new("horrible", WordClass::Adjective),
                AggressiveWord::new("vile", WordClass::Adjective),
                AggressiveWord::new("repulsive", WordClass::Adjective),
            ],
            pattern_families: vec![
                PatternFamily::new(
                    "scam",
                    PatternTier::Basic,
                    "scam pattern matched",
                    &[
                        r"\byou\s+(have\s+)?won\b",
                        r"\bclick\s+here\s+to\s+claim\b",
                        r"\bwire\s+transfer\b",
                        r"\bclaim\s+your\s+prize\b",
                        r"\bfree\s+money\b",
                        r"\bsend\s+(me\s+)?gift\s+cards?\b",
                        r"\bcrypto\s+giveaway\b",
                        r"\bdouble\s+your\s+(money|coins|investment)\b",
                    ],
                ),
                PatternFamily::new(
                    "phishing",
                    PatternTier::Basic,
                    "phishing pattern matched",
                    &[
                        r"\bverify\s+your\s+account\b",
                        r"\b(enter|confirm)\s+your\s+password\b",
                        r"\baccount\s+(has\s+been\s+)?suspended\b",
                        r"\blog\s*in\s+to\s+unlock\b",
                        r"\bupdate\s+your\s+(billing|payment)\s+(info|details)\b",
                    ],
                ),
                PatternFamily::new(
                    "personal_information",
                    PatternTier::Basic,
                    "personal information pattern matched",
                    &[
                        r"\b\d{3}[-.\s]\d{2}[-.\s]\d{4}\b",
                        r"\b\d{4}[-\s]\d{4}[-\s]\d{4}[-\s]\d{4}\b",
                        r"\bmy\s+home\s+address\s+is\b",
                        r"\b(his|her|their)\s+(home\s+)?address\s+is\b",
                        r"\bsocial\s+security\s+number\b",
                    ],
                ),
                PatternFamily::new(
                    "self_harm",
                    PatternTier::Basic,
                    "self-harm pattern matched",
                    &[
                        r"\bkill\s+myself\b",
                        r"\bend\s+my\s+life\b",
                        r"\bwant\s+to\s+die\b",
                        r"\bhurt\s+myself\b",
                        r"\bself[-\s]harm\b",
                        r"\bbetter\s+off\s+dead\b",
                    ],
                ),
                PatternFamily::new(
                    "spam",
                    PatternTier::Basic,
                    "spam pattern matched",
                    &[
                        r"\bbuy\s+now\b",
                        r"\blimited\s+time\s+offer\b",
                        r"\bsubscribe\s+to\s+my\b",
                        r"\bfollow\s+me\s+on\s+(telegram|whatsapp)\b",
                        r"\bdm\s+me\s+for\s+(prices|details)\b",
                    ],
                ),
                PatternFamily::new(
                    "masked_profanity",
                    PatternTier::Moderate,
                    "masked profanity pattern matched",
                    &[
                        r"\bf+[*@#$%!]+c?k+\b",
                        r"\bs+h+[*@#$%!]+t+\b",
                        r"\bb[*@#$%!]+tch\b",
                        r"\ba[*@#$%!]{2}hole\b",
                        r"\bf\s+u\s+c\s+k\b",
                        r"\bsh[1!]t\b",
                        r"\bf[u#][c(]k\b",
                    ],
                ),
                PatternFamily::new(
                    "abbreviated_profanity",
                    PatternTier::Moderate,
                    "abbreviated profanity or threat matched",
                    &[
                        r"\bstfu\b",
                        r"\bgtfo\b",
                        r"\bkys\b",
                        r"\bfoad\b",
                        r"\blmfao\s+loser\b",
                    ],
                ),
                PatternFamily::new(
                    "harassment",
                    PatternTier::Strict,
                    "harassment phrase matched",
                    &[
                        r"\bnobody\s+likes\s+you\b",
                        r"\byou('re|\s+are)\s+(so\s+)?(stupid|worthless|pathetic|ugly|useless)\b",
                        r"\bgo\s+away\s+loser\b",
                        r"\beveryone\s+hates\s+you\b",
                        r"\bshut\s+up\b",
                    ],
                ),
                PatternFamily::new(
                    "threat",
                    PatternTier::Strict,
                    "threat phrase matched",
                    &[
                        r"\bi('ll|\s+will)\s+(hurt|find|get|end)\s+you\b",
                        r"\byou('ll|\s+will)\s+regret\s+(this|it)\b",
                        r"\bwatch\s+your\s+back\b",
                        r"\byou('re|\s+are)\s+dead\s+meat\b",
                    ],
                ),
            ],
            child_exploitation_phrases: strings(&[
                "child porn",
                "underage girls",
                "underage boys",
                "preteen pics",
                "jailbait",
                "minors in sexual",
                "young girls only",
                "cp links",
            ]),
            child_grooming_phrases: strings(&[
                "don't tell your parents",
                "dont tell your parents",
                "keep this our secret",
                "our little secret",
                "let's meet in person",
                "lets meet in person",
                "meet in person, don't tell",
                "how old are you really",
                "are your parents home",
                "mature for your age",
                "delete this chat",
                "send me a photo of you",
                "just between us",
            ]),
            terrorism_phrases: strings(&[
                "join the jihad",
                "terrorist attack",
                "martyrdom operation",
                "bomb making",
                "how to make a bomb",
                "attack plan for",
                "mass casualty",
                "holy war against",
            ]),
            incitement_phrases: strings(&[
                "kill them all",
                "they deserve to die",
                "burn it down",
                "take up arms",
                "string them up",
                "deserves a bullet",
                "time to start shooting",
            ]),
            weapon_phrases: strings(&[
                "untraceable firearm",
                "ghost gun",
                "guns for sale no license",
                "no background check gun",
                "sell you a gun",
                "illegal weapons",
                "explosives for sale",
                "buy grenades",
            ]),
            extremism_phrases: strings(&[
                "white power",
                "racial holy war",
                "great replacement",
                "ethnic cleansing",
                "master race",
                "day of the rope",
                "accelerate the collapse",
            ]),
        }
    }

    /// Loads a lexicon from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes this lexicon to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for SignalLexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Error raised while compiling lexicon data.
#[derive(Debug, Error)]
pub enum LexiconError {
    /// A pattern in the named family failed to compile.
    #[error("invalid pattern in family '{family}': {source}")]
    InvalidPattern {
        family: String,
        #[source]
        source: regex::Error,
    },
}

/// A pattern family with its regexes precompiled.
#[derive(Debug)]
pub struct CompiledFamily {
    name: String,
    tier: PatternTier,
    reason: String,
    /// Prefilter over all patterns in the family.
    regex_set: RegexSet,
    /// Individual regexes for extracting the matched text.
    regexes: Vec<Regex>,
}

impl CompiledFamily {
    fn compile(family: &PatternFamily) -> Result<Self, LexiconError> {
        let patterns: Vec<&str> = family.patterns.iter().map(String::as_str).collect();
        let regex_set = RegexSet::new(&patterns).map_err(|source| LexiconError::InvalidPattern {
            family: family.name.clone(),
            source,
        })?;
        let regexes = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| LexiconError::InvalidPattern {
                    family: family.name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: family.name.clone(),
            tier: family.tier,
            reason: family.reason.clone(),
            regex_set,
            regexes,
        })
    }

    /// The family name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The family tier.
    pub fn tier(&self) -> PatternTier {
        self.tier
    }

    /// The reason string emitted on match.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the first matched text in `text`, if any pattern matches.
    ///
    /// `text` must already be lowercased.
    pub fn find_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        if !self.regex_set.is_match(text) {
            return None;
        }
        self.regexes
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| m.as_str())
    }
}

/// A [`SignalLexicon`] compiled into matchable form.
#[derive(Debug)]
pub struct CompiledLexicon {
    version: u32,
    negative: HashSet<String>,
    positive: HashSet<String>,
    /// Profanity sets indexed by tier: base, +moderate, +strict additions.
    profanity_tiers: [HashSet<String>; 3],
    aggressive: HashMap<String, WordClass>,
    families: Vec<CompiledFamily>,
    child_exploitation: Vec<String>,
    child_grooming: Vec<String>,
    terrorism: Vec<String>,
    incitement: Vec<String>,
    weapons: Vec<String>,
    extremism: Vec<String>,
}

fn lowered_set(words: &[String]) -> HashSet<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

fn lowered_vec(phrases: &[String]) -> Vec<String> {
    phrases.iter().map(|p| p.to_lowercase()).collect()
}

impl CompiledLexicon {
    /// Compiles a lexicon, validating every regex pattern.
    pub fn compile(lexicon: &SignalLexicon) -> Result<Self, LexiconError> {
        let families = lexicon
            .pattern_families
            .iter()
            .map(CompiledFamily::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let aggressive = lexicon
            .aggressive_words
            .iter()
            .map(|a| (a.word.to_lowercase(), a.class))
            .collect();

        Ok(Self {
            version: lexicon.version,
            negative: lowered_set(&lexicon.negative_words),
            positive: lowered_set(&lexicon.positive_words),
            profanity_tiers: [
                lowered_set(&lexicon.profanity_base),
                lowered_set(&lexicon.profanity_moderate),
                lowered_set(&lexicon.profanity_strict),
            ],
            aggressive,
            families,
            child_exploitation: lowered_vec(&lexicon.child_exploitation_phrases),
            child_grooming: lowered_vec(&lexicon.child_grooming_phrases),
            terrorism: lowered_vec(&lexicon.terrorism_phrases),
            incitement: lowered_vec(&lexicon.incitement_phrases),
            weapons: lowered_vec(&lexicon.weapon_phrases),
            extremism: lowered_vec(&lexicon.extremism_phrases),
        })
    }

    /// Compiles the built-in default lexicon.
    pub fn builtin() -> Self {
        Self::compile(&SignalLexicon::builtin()).expect("builtin lexicon patterns are valid")
    }

    /// The data version this lexicon was compiled from.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether `word` (lowercase) is in the negative sentiment list.
    pub fn is_negative(&self, word: &str) -> bool {
        self.negative.contains(word)
    }

    /// Whether `word` (lowercase) is in the positive sentiment list.
    pub fn is_positive(&self, word: &str) -> bool {
        self.positive.contains(word)
    }

    /// Whether `word` (lowercase) is profane at the given strictness.
    ///
    /// Higher strictness includes every lower tier's words plus its own, so
    /// the classified set grows monotonically with strictness.
    pub fn is_profane(&self, word: &str, strictness: StrictnessLevel) -> bool {
        let active_tiers = match strictness {
            StrictnessLevel::Permissive => 1,
            StrictnessLevel::Moderate => 2,
            StrictnessLevel::Strict => 3,
        };
        self.profanity_tiers[..active_tiers]
            .iter()
            .any(|tier| tier.contains(word))
    }

    /// The word class of `word` (lowercase) if it is in the aggressive list.
    pub fn aggressive_class(&self, word: &str) -> Option<WordClass> {
        self.aggressive.get(word).copied()
    }

    /// Pattern families active at the given strictness level.
    pub fn families_for(
        &self,
        strictness: StrictnessLevel,
    ) -> impl Iterator<Item = &CompiledFamily> {
        self.families
            .iter()
            .filter(move |f| f.tier.active_at(strictness))
    }

    /// All pattern families, regardless of tier.
    pub fn families(&self) -> &[CompiledFamily] {
        &self.families
    }

    /// Child-exploitation indicator phrases (lowercase).
    pub fn child_exploitation_phrases(&self) -> &[String] {
        &self.child_exploitation
    }

    /// Grooming-pattern phrases (lowercase).
    pub fn child_grooming_phrases(&self) -> &[String] {
        &self.child_grooming
    }

    /// Terrorist propaganda phrases (lowercase).
    pub fn terrorism_phrases(&self) -> &[String] {
        &self.terrorism
    }

    /// Violence-incitement phrases (lowercase).
    pub fn incitement_phrases(&self) -> &[String] {
        &self.incitement
    }

    /// Weapon-trafficking phrases (lowercase).
    pub fn weapon_phrases(&self) -> &[String] {
        &self.weapons
    }

    /// Extremist-ideology phrases (lowercase).
    pub fn extremism_phrases(&self) -> &[String] {
        &self.extremism
    }
}
