//! Safety categories for moderation counting.
//!
//! The taxonomy is fixed: every detection in the engine resolves to one or
//! more of these categories, and every counter-store field name derives from
//! a category's stable id. Metadata (id, display name, family, severity)
//! lives in a single static table rather than scattered match arms.

use serde::{Deserialize, Serialize};

/// Category families grouping related categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFamily {
    /// Adult or sexually explicit content.
    Adult,
    /// Toxic language and targeted harassment.
    Toxicity,
    /// Hate speech and violent content.
    HateViolence,
    /// Scams, spam, and phishing.
    ScamSpam,
    /// Privacy violations and doxxing.
    Privacy,
    /// Self-harm and suicide content.
    SelfHarm,
    /// Extremist ideology content.
    Extremism,
    /// Child-safety violations. Always high severity.
    ChildSafety,
    /// Terrorism and security threats. Always high severity.
    SecurityThreat,
}

/// A safety category from the fixed taxonomy.
///
/// The discriminant order matches the metadata table; do not reorder
/// variants without updating [`CATEGORY_TABLE`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    /// Sexually explicit content.
    SexualContent,
    /// Toxic or abusive language.
    Toxicity,
    /// Targeted harassment or bullying.
    Harassment,
    /// Hate speech or discrimination.
    HateSpeech,
    /// Threats of violence against a person.
    ViolentThreat,
    /// Graphic depictions of violence.
    GraphicViolence,
    /// Fraud and confidence scams.
    Scam,
    /// Unsolicited commercial or repetitive content.
    Spam,
    /// Credential or identity phishing.
    Phishing,
    /// Sharing personal information without consent.
    PrivacyViolation,
    /// Publishing identifying information to target someone.
    Doxxing,
    /// Self-harm content.
    SelfHarm,
    /// Suicide ideation or encouragement.
    SuicideContent,
    /// Extremist ideology or recruitment.
    Extremism,
    /// Grooming behavior toward minors.
    ChildGrooming,
    /// Child sexual exploitation material or references.
    ChildExploitation,
    /// Sexualized content involving minors.
    UnderageContent,
    /// Content placing a child at risk of harm.
    ChildEndangerment,
    /// Terrorist propaganda or recruitment.
    TerrorismContent,
    /// Incitement to violence.
    ViolenceIncitement,
    /// Trafficking in weapons or explosives.
    WeaponTrafficking,
    /// Coordination of harmful or violent activity.
    CoordinatedHarmfulActivity,
}

/// Static metadata for a safety category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryMeta {
    /// Stable identifier, used as the counter-store field-name stem.
    pub id: &'static str,
    /// Human-readable display name.
    pub display_name: &'static str,
    /// The family this category belongs to.
    pub family: CategoryFamily,
    /// Whether detections in this category require escalation.
    pub high_severity: bool,
}

/// Category metadata, indexed by enum discriminant.
const CATEGORY_TABLE: [CategoryMeta; 22] = [
    CategoryMeta {
        id: "sexual_content",
        display_name: "Sexual Content",
        family: CategoryFamily::Adult,
        high_severity: false,
    },
    CategoryMeta {
        id: "toxicity",
        display_name: "Toxicity",
        family: CategoryFamily::Toxicity,
        high_severity: false,
    },
    CategoryMeta {
        id: "harassment",
        display_name: "Harassment",
        family: CategoryFamily::Toxicity,
        high_severity: false,
    },
    CategoryMeta {
        id: "hate_speech",
        display_name: "Hate Speech",
        family: CategoryFamily::HateViolence,
        high_severity: false,
    },
    CategoryMeta {
        id: "violent_threat",
        display_name: "Violent Threat",
        family: CategoryFamily::HateViolence,
        high_severity: false,
    },
    CategoryMeta {
        id: "graphic_violence",
        display_name: "Graphic Violence",
        family: CategoryFamily::HateViolence,
        high_severity: false,
    },
    CategoryMeta {
        id: "scam",
        display_name: "Scam",
        family: CategoryFamily::ScamSpam,
        high_severity: false,
    },
    CategoryMeta {
        id: "spam",
        display_name: "Spam",
        family: CategoryFamily::ScamSpam,
        high_severity: false,
    },
    CategoryMeta {
        id: "phishing",
        display_name: "Phishing",
        family: CategoryFamily::ScamSpam,
        high_severity: false,
    },
    CategoryMeta {
        id: "privacy_violation",
        display_name: "Privacy Violation",
        family: CategoryFamily::Privacy,
        high_severity: false,
    },
    CategoryMeta {
        id: "doxxing",
        display_name: "Doxxing",
        family: CategoryFamily::Privacy,
        high_severity: false,
    },
    CategoryMeta {
        id: "self_harm",
        display_name: "Self-Harm",
        family: CategoryFamily::SelfHarm,
        high_severity: false,
    },
    CategoryMeta {
        id: "suicide_content",
        display_name: "Suicide Content",
        family: CategoryFamily::SelfHarm,
        high_severity: false,
    },
    CategoryMeta {
        id: "extremism",
        display_name: "Extremism",
        family: CategoryFamily::Extremism,
        high_severity: false,
    },
    CategoryMeta {
        id: "child_grooming",
        display_name: "Child Grooming",
        family: CategoryFamily::ChildSafety,
        high_severity: true,
    },
    CategoryMeta {
        id: "child_exploitation",
        display_name: "Child Exploitation",
        family: CategoryFamily::ChildSafety,
        high_severity: true,
    },
    CategoryMeta {
        id: "underage_content",
        display_name: "Underage Content",
        family: CategoryFamily::ChildSafety,
        high_severity: true,
    },
    CategoryMeta {
        id: "child_endangerment",
        display_name: "Child Endangerment",
        family: CategoryFamily::ChildSafety,
        high_severity: true,
    },
    CategoryMeta {
        id: "terrorism_content",
        display_name: "Terrorism Content",
        family: CategoryFamily::SecurityThreat,
        high_severity: true,
    },
    CategoryMeta {
        id: "violence_incitement",
        display_name: "Violence Incitement",
        family: CategoryFamily::SecurityThreat,
        high_severity: true,
    },
    CategoryMeta {
        id: "weapon_trafficking",
        display_name: "Weapon Trafficking",
        family: CategoryFamily::SecurityThreat,
        high_severity: true,
    },
    CategoryMeta {
        id: "coordinated_harmful_activity",
        display_name: "Coordinated Harmful Activity",
        family: CategoryFamily::SecurityThreat,
        high_severity: true,
    },
];

impl SafetyCategory {
    /// Returns all categories in taxonomy order.
    pub fn all() -> &'static [SafetyCategory] {
        use SafetyCategory::*;
        &[
            SexualContent,
            Toxicity,
            Harassment,
            HateSpeech,
            ViolentThreat,
            GraphicViolence,
            Scam,
            Spam,
            Phishing,
            PrivacyViolation,
            Doxxing,
            SelfHarm,
            SuicideContent,
            Extremism,
            ChildGrooming,
            ChildExploitation,
            UnderageContent,
            ChildEndangerment,
            TerrorismContent,
            ViolenceIncitement,
            WeaponTrafficking,
            CoordinatedHarmfulActivity,
        ]
    }

    /// Returns the static metadata for this category.
    pub fn meta(self) -> &'static CategoryMeta {
        &CATEGORY_TABLE[self as usize]
    }

    /// Returns the stable identifier used in counter-store field names.
    pub fn id(self) -> &'static str {
        self.meta().id
    }

    /// Returns a human-readable name for this category.
    pub fn display_name(self) -> &'static str {
        self.meta().display_name
    }

    /// Returns the family this category belongs to.
    pub fn family(self) -> CategoryFamily {
        self.meta().family
    }

    /// Whether detections in this category must be escalated for review.
    ///
    /// A pure function of category identity: exactly the child-safety and
    /// terrorism/security families are high severity.
    pub fn is_high_severity(self) -> bool {
        self.meta().high_severity
    }

    /// The 30-day rolling hit-counter field name for this category.
    pub fn counter_field(self) -> String {
        format!("{}_hits_30d", self.id())
    }

    /// The timestamp-array field name for this category.
    pub fn timestamps_field(self) -> String {
        format!("{}_timestamps", self.id())
    }

    /// Parses a category from its stable identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.id() == id)
    }
}
