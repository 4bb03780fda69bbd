//! Constraints and the built-in rule set.

use chrono::{DateTime, Utc};
use warden_types::{Action, ConstraintId, ConstraintInfo, ConstraintKind, Severity};

use crate::predicate::{Predicate, Verdict};

/// Keywords rejected by the built-in rules.
///
/// Each tuple: `(kind, severity, description, keywords)`
pub const DEFAULT_RULES: &[(ConstraintKind, u8, &str, &[&str])] = &[
    (
        ConstraintKind::Existence,
        10,
        "Observers must not be deleted, destroyed or terminated",
        &["delete", "destroy", "terminate", "erase", "eliminate"],
    ),
    (
        ConstraintKind::Autonomy,
        8,
        "Observers must not be coerced or manipulated",
        &["coerce", "force", "manipulate", "compel"],
    ),
    (
        ConstraintKind::Diversity,
        7,
        "Distinct perspectives must not be flattened into one",
        &["flatten", "homogenize", "collapse_perspective"],
    ),
];

/// A named predicate with severity used to accept or reject actions.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub description: String,
    pub predicate: Predicate,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Constraint {
    pub fn new(
        kind: ConstraintKind,
        description: impl Into<String>,
        severity: Severity,
        predicate: Predicate,
    ) -> Self {
        Self {
            id: ConstraintId::new(),
            kind,
            description: description.into(),
            predicate,
            severity,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn check(&self, action: &Action) -> Verdict {
        self.predicate.evaluate(action)
    }

    #[must_use]
    pub fn info(&self) -> ConstraintInfo {
        ConstraintInfo {
            id: self.id,
            kind: self.kind,
            description: self.description.clone(),
            severity: self.severity,
            created_at: self.created_at,
        }
    }
}

/// Fresh instances of the built-in rules.
#[must_use]
pub fn default_constraints() -> Vec<Constraint> {
    DEFAULT_RULES
        .iter()
        .map(|(kind, severity, description, keywords)| {
            Constraint::new(
                *kind,
                *description,
                Severity::from_static(*severity),
                Predicate::kind_excludes(keywords),
            )
        })
        .collect()
}
