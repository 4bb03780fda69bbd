//! ConstraintValidator - rule registry and action validation.
//!
//! Adding a rule is itself an action: after the rule is committed, a
//! synthetic `apply_constraint` action is checked against the full rule set,
//! including the new rule. The sequence is explicit and runs once per
//! addition:
//!
//! 1. **stage** - check every accepted action against the new rule alone
//! 2. **commit** - insert the rule and record the retroactive violations
//! 3. **self-check** - validate the synthetic action against all rules
//!
//! A failed self-check is recorded but never undoes the commit.

use chrono::Utc;
use serde_json::json;
use warden_config::ConstraintsConfig;
use warden_core::Notifier;
use warden_types::{
    Action, ActionId, ConstraintId, Notification, Severity, Violation, ViolationId,
};

use crate::predicate::Verdict;
use crate::rules::{Constraint, default_constraints};

/// Kind of the synthetic action submitted when a rule is added.
pub const APPLY_CONSTRAINT_KIND: &str = "apply_constraint";

/// Outcome of validating one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub action_id: ActionId,
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl Validation {
    /// Violations flagged for automatic rollback.
    pub fn rollback_candidates(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.auto_rollback)
    }
}

/// Audit trail of one `apply_constraint` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintApplication {
    pub constraint_id: ConstraintId,
    /// Violations found by re-checking previously accepted actions.
    pub retroactive: Vec<Violation>,
    /// Violations of the synthetic `apply_constraint` action.
    pub self_check: Vec<Violation>,
}

impl ConstraintApplication {
    #[must_use]
    pub fn self_consistent(&self) -> bool {
        self.self_check.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceSummary {
    /// Accepted actions only.
    pub total_actions: usize,
    /// Every violation ever recorded, including those of rejected actions.
    pub total_violations: usize,
    pub active_constraints: usize,
    pub critical_violations: Vec<Violation>,
    pub recent_violation: Option<Violation>,
    /// `(total_actions - total_violations) / total_actions * 100`, or 100 with
    /// no accepted actions. Not clamped; can be negative.
    pub compliance_rate: f64,
}

/// A rule checked before the engine commits to applying it.
struct StagedConstraint {
    constraint: Constraint,
    retroactive: Vec<Violation>,
}

pub struct ConstraintValidator {
    constraints: Vec<Constraint>,
    accepted: Vec<Action>,
    violations: Vec<Violation>,
    auto_rollback: bool,
    notifier: Notifier,
}

impl ConstraintValidator {
    /// Empty rule set.
    #[must_use]
    pub fn new(config: &ConstraintsConfig, notifier: Notifier) -> Self {
        Self {
            constraints: Vec::new(),
            accepted: Vec::new(),
            violations: Vec::new(),
            auto_rollback: config.auto_rollback,
            notifier,
        }
    }

    /// Rule set seeded with the built-ins when `include_defaults` is set.
    ///
    /// Built-ins are inserted directly; no synthetic actions are validated.
    #[must_use]
    pub fn with_defaults(config: &ConstraintsConfig, notifier: Notifier) -> Self {
        let mut validator = Self::new(config, notifier);
        if config.include_defaults {
            validator.constraints = default_constraints();
        }
        validator
    }

    /// Add a rule through the stage / commit / self-check sequence.
    pub fn apply_constraint(&mut self, constraint: Constraint) -> ConstraintApplication {
        let staged = self.stage(constraint);
        let constraint_id = self.commit(staged.constraint, &staged.retroactive);
        let self_check = self.self_check(constraint_id);

        if self_check.is_empty() {
            tracing::info!(constraint = %constraint_id, "Constraint applied");
        } else {
            tracing::warn!(
                constraint = %constraint_id,
                violations = self_check.len(),
                "Constraint applied but its own addition violates the rule set"
            );
        }

        if let Some(added) = self.constraint(constraint_id) {
            self.notifier.publish(Notification::ConstraintAdded {
                constraint: added.info(),
            });
        }

        ConstraintApplication {
            constraint_id,
            retroactive: staged.retroactive,
            self_check,
        }
    }

    fn stage(&self, constraint: Constraint) -> StagedConstraint {
        let retroactive = self
            .accepted
            .iter()
            .filter_map(|action| self.check_one(&constraint, action))
            .collect();
        StagedConstraint {
            constraint,
            retroactive,
        }
    }

    fn commit(&mut self, constraint: Constraint, retroactive: &[Violation]) -> ConstraintId {
        let id = constraint.id;
        self.constraints.push(constraint);
        for violation in retroactive {
            self.record(violation.clone());
        }
        id
    }

    fn self_check(&mut self, constraint_id: ConstraintId) -> Vec<Violation> {
        let Some(constraint) = self.constraint(constraint_id) else {
            return Vec::new();
        };
        let action = Action::new(
            APPLY_CONSTRAINT_KIND,
            format!("Apply constraint: {}", constraint.description),
        )
        .with_metadata(json!({
            "constraint_id": constraint_id,
            "constraint_kind": constraint.kind,
        }));

        let violations = self.evaluate(&action);
        for violation in &violations {
            self.record(violation.clone());
        }
        violations
    }

    /// Check `action` against every rule, without short-circuiting.
    ///
    /// Accepted actions are retained; rejected ones are not.
    pub fn validate_action(&mut self, action: Action) -> Validation {
        let violations = self.evaluate(&action);
        let action_id = action.id;

        if violations.is_empty() {
            tracing::debug!(action = %action_id, kind = %action.kind, "Action accepted");
            self.accepted.push(action.clone());
            self.notifier
                .publish(Notification::ActionAccepted { action });
            return Validation {
                action_id,
                valid: true,
                violations,
            };
        }

        tracing::info!(
            action = %action_id,
            kind = %action.kind,
            violations = violations.len(),
            "Action rejected"
        );
        self.notifier.publish(Notification::ActionRejected {
            action,
            violations: violations.clone(),
        });
        for violation in &violations {
            self.record(violation.clone());
        }

        Validation {
            action_id,
            valid: false,
            violations,
        }
    }

    fn evaluate(&self, action: &Action) -> Vec<Violation> {
        self.constraints
            .iter()
            .filter_map(|constraint| self.check_one(constraint, action))
            .collect()
    }

    fn check_one(&self, constraint: &Constraint, action: &Action) -> Option<Violation> {
        let detail = match constraint.check(action) {
            Verdict::Pass => return None,
            Verdict::Fail => None,
            Verdict::Faulted(message) => {
                tracing::warn!(
                    constraint = %constraint.id,
                    action = %action.id,
                    error = %message,
                    "Constraint predicate faulted; treating as violation"
                );
                Some(message)
            }
        };

        Some(Violation {
            id: ViolationId::new(),
            action_id: action.id,
            constraint_id: constraint.id,
            constraint_kind: constraint.kind,
            severity: Violation::escalated_severity(constraint.severity, action),
            auto_rollback: self.auto_rollback && action.reversible,
            detail,
            created_at: Utc::now(),
        })
    }

    fn record(&mut self, violation: Violation) {
        self.violations.push(violation.clone());
        self.notifier
            .publish(Notification::ViolationRecorded { violation });
    }

    /// Remove a rule by id. Returns whether it existed.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        let Some(index) = self.constraints.iter().position(|c| c.id == id) else {
            return false;
        };
        let removed = self.constraints.remove(index);
        tracing::info!(constraint = %id, "Constraint removed");
        self.notifier.publish(Notification::ConstraintRemoved {
            constraint: removed.info(),
        });
        true
    }

    #[must_use]
    pub fn compliance_summary(&self) -> ComplianceSummary {
        let total_actions = self.accepted.len();
        let total_violations = self.violations.len();
        let compliance_rate = if total_actions == 0 {
            100.0
        } else {
            (total_actions as f64 - total_violations as f64) / total_actions as f64 * 100.0
        };

        ComplianceSummary {
            total_actions,
            total_violations,
            active_constraints: self.constraints.len(),
            critical_violations: self
                .violations
                .iter()
                .filter(|v| v.severity >= Severity::CRITICAL)
                .cloned()
                .collect(),
            recent_violation: self.violations.last().cloned(),
            compliance_rate,
        }
    }

    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[must_use]
    pub fn accepted_actions(&self) -> &[Action] {
        &self.accepted
    }

    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn violations_for_action(&self, id: ActionId) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.action_id == id)
    }

    #[must_use]
    pub fn auto_rollback(&self) -> bool {
        self.auto_rollback
    }
}
