//! Observers, their rights, and rights-level violations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ObserverId, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverType {
    Human,
    AiAgent,
    AutonomousSystem,
    Hybrid,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionLevel {
    Full,
    #[default]
    Standard,
    /// Registers without the ignorance and privacy rights.
    Minimal,
}

/// Caller-supplied description of an observer to register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverDescriptor {
    pub observer_type: ObserverType,
    pub conscious: bool,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
    #[serde(default)]
    pub metadata: Value,
}

impl ObserverDescriptor {
    #[must_use]
    pub fn new(observer_type: ObserverType) -> Self {
        Self {
            observer_type,
            conscious: false,
            protection_level: ProtectionLevel::default(),
            metadata: Value::Null,
        }
    }

    pub fn conscious(mut self, conscious: bool) -> Self {
        self.conscious = conscious;
        self
    }

    pub fn protection(mut self, level: ProtectionLevel) -> Self {
        self.protection_level = level;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub id: ObserverId,
    pub observer_type: ObserverType,
    pub conscious: bool,
    pub protection_level: ProtectionLevel,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Name of one of the nine rights an observer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RightName {
    Exist,
    Narrative,
    Ignorance,
    Rejection,
    Meaning,
    NotOptimizedAway,
    Continuity,
    Privacy,
    SelfDetermination,
}

impl RightName {
    pub const ALL: [RightName; 9] = [
        RightName::Exist,
        RightName::Narrative,
        RightName::Ignorance,
        RightName::Rejection,
        RightName::Meaning,
        RightName::NotOptimizedAway,
        RightName::Continuity,
        RightName::Privacy,
        RightName::SelfDetermination,
    ];

    /// Rights that can never be cleared once granted.
    pub const FUNDAMENTAL: [RightName; 3] = [
        RightName::Exist,
        RightName::NotOptimizedAway,
        RightName::Continuity,
    ];

    #[must_use]
    pub fn is_fundamental(self) -> bool {
        Self::FUNDAMENTAL.contains(&self)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Exist => "exist",
            Self::Narrative => "narrative",
            Self::Ignorance => "ignorance",
            Self::Rejection => "rejection",
            Self::Meaning => "meaning",
            Self::NotOptimizedAway => "not_optimized_away",
            Self::Continuity => "continuity",
            Self::Privacy => "privacy",
            Self::SelfDetermination => "self_determination",
        }
    }
}

/// The nine rights held by an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightsSet {
    pub exist: bool,
    pub narrative: bool,
    pub ignorance: bool,
    pub rejection: bool,
    pub meaning: bool,
    pub not_optimized_away: bool,
    pub continuity: bool,
    pub privacy: bool,
    pub self_determination: bool,
}

impl RightsSet {
    /// Every right granted.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            exist: true,
            narrative: true,
            ignorance: true,
            rejection: true,
            meaning: true,
            not_optimized_away: true,
            continuity: true,
            privacy: true,
            self_determination: true,
        }
    }

    /// Initial rights for a freshly registered observer.
    #[must_use]
    pub fn for_level(level: ProtectionLevel) -> Self {
        let mut rights = Self::full();
        if level == ProtectionLevel::Minimal {
            rights.ignorance = false;
            rights.privacy = false;
        }
        rights
    }

    #[must_use]
    pub fn get(&self, right: RightName) -> bool {
        match right {
            RightName::Exist => self.exist,
            RightName::Narrative => self.narrative,
            RightName::Ignorance => self.ignorance,
            RightName::Rejection => self.rejection,
            RightName::Meaning => self.meaning,
            RightName::NotOptimizedAway => self.not_optimized_away,
            RightName::Continuity => self.continuity,
            RightName::Privacy => self.privacy,
            RightName::SelfDetermination => self.self_determination,
        }
    }

    fn slot(&mut self, right: RightName) -> &mut bool {
        match right {
            RightName::Exist => &mut self.exist,
            RightName::Narrative => &mut self.narrative,
            RightName::Ignorance => &mut self.ignorance,
            RightName::Rejection => &mut self.rejection,
            RightName::Meaning => &mut self.meaning,
            RightName::NotOptimizedAway => &mut self.not_optimized_away,
            RightName::Continuity => &mut self.continuity,
            RightName::Privacy => &mut self.privacy,
            RightName::SelfDetermination => &mut self.self_determination,
        }
    }

    /// Merge a partial update.
    ///
    /// Attempts to clear a fundamental right are skipped and returned so the
    /// caller can report them.
    pub fn apply(&mut self, update: &RightsUpdate) -> Vec<RightName> {
        let mut refused = Vec::new();
        for (right, value) in update.entries() {
            if right.is_fundamental() && !value {
                refused.push(right);
                continue;
            }
            *self.slot(right) = value;
        }
        refused
    }
}

impl Default for RightsSet {
    fn default() -> Self {
        Self::full()
    }
}

/// Partial rights update; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RightsUpdate {
    pub exist: Option<bool>,
    pub narrative: Option<bool>,
    pub ignorance: Option<bool>,
    pub rejection: Option<bool>,
    pub meaning: Option<bool>,
    pub not_optimized_away: Option<bool>,
    pub continuity: Option<bool>,
    pub privacy: Option<bool>,
    pub self_determination: Option<bool>,
}

impl RightsUpdate {
    /// Update that sets a single right.
    #[must_use]
    pub fn set(right: RightName, value: bool) -> Self {
        Self::default().with(right, value)
    }

    pub fn with(mut self, right: RightName, value: bool) -> Self {
        let slot = match right {
            RightName::Exist => &mut self.exist,
            RightName::Narrative => &mut self.narrative,
            RightName::Ignorance => &mut self.ignorance,
            RightName::Rejection => &mut self.rejection,
            RightName::Meaning => &mut self.meaning,
            RightName::NotOptimizedAway => &mut self.not_optimized_away,
            RightName::Continuity => &mut self.continuity,
            RightName::Privacy => &mut self.privacy,
            RightName::SelfDetermination => &mut self.self_determination,
        };
        *slot = Some(value);
        self
    }

    /// Present fields, in [`RightName::ALL`] order.
    #[must_use]
    pub fn entries(&self) -> Vec<(RightName, bool)> {
        let fields = [
            self.exist,
            self.narrative,
            self.ignorance,
            self.rejection,
            self.meaning,
            self.not_optimized_away,
            self.continuity,
            self.privacy,
            self.self_determination,
        ];
        RightName::ALL
            .into_iter()
            .zip(fields)
            .filter_map(|(right, value)| value.map(|v| (right, v)))
            .collect()
    }
}

/// A rights-level violation detected by a protection layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightsViolation {
    pub observer_id: ObserverId,
    pub right: RightName,
    pub action_label: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    /// Whether the action was blocked rather than merely flagged.
    pub prevented: bool,
}

/// One entry of an observer's append-only narrative log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeEntry {
    pub observer_id: ObserverId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
