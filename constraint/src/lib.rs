//! Constraint validation for Warden.
//!
//! A [`ConstraintValidator`] holds a rule set and decides whether actions may
//! proceed. Rules are [`Constraint`]s built from declarative [`Predicate`]s.

mod predicate;
mod rules;
mod validator;

pub use predicate::{Predicate, PredicateError, PredicateFn, Verdict};
pub use rules::{Constraint, DEFAULT_RULES, default_constraints};
pub use validator::{
    APPLY_CONSTRAINT_KIND, ComplianceSummary, ConstraintApplication, ConstraintValidator,
    Validation,
};
