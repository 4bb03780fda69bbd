//! Actions submitted for validation and the violations they produce.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ActionId, ConstraintId, ObserverId, Severity, ViolationId};

/// Category a constraint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Protects observers from deletion or termination.
    Existence,
    /// Protects observers from coercion.
    Autonomy,
    /// Protects plurality of perspectives from being flattened.
    Diversity,
    Safety,
    Custom,
}

impl ConstraintKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Existence => "existence",
            Self::Autonomy => "autonomy",
            Self::Diversity => "diversity",
            Self::Safety => "safety",
            Self::Custom => "custom",
        }
    }
}

/// A proposed operation submitted for validation.
///
/// Built with [`Action::new`] and the chained setters:
///
/// ```
/// use warden_types::{Action, ObserverId};
///
/// let target = ObserverId::new();
/// let action = Action::new("archive_logs", "Archive old logs")
///     .targeting([target])
///     .irreversible();
/// assert!(action.has_targets());
/// assert!(!action.reversible);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub kind: String,
    pub description: String,
    pub targets: BTreeSet<ObserverId>,
    pub reversible: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Action {
    /// New reversible action with no targets and empty metadata.
    #[must_use]
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(),
            kind: kind.into(),
            description: description.into(),
            targets: BTreeSet::new(),
            reversible: true,
            metadata: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn targeting(mut self, observers: impl IntoIterator<Item = ObserverId>) -> Self {
        self.targets.extend(observers);
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }
}

/// A record that a specific action failed a specific constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: ViolationId,
    pub action_id: ActionId,
    pub constraint_id: ConstraintId,
    pub constraint_kind: ConstraintKind,
    pub severity: Severity,
    pub auto_rollback: bool,
    /// Set when the predicate errored or panicked instead of returning false.
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Violation {
    /// Severity escalation applied to a constraint's base severity:
    /// +2 when the action targets observers, +3 when it cannot be undone.
    #[must_use]
    pub fn escalated_severity(base: Severity, action: &Action) -> Severity {
        let mut bump = 0;
        if action.has_targets() {
            bump += 2;
        }
        if !action.reversible {
            bump += 3;
        }
        base.escalate(bump)
    }
}
