//! Governance engine for Warden.
//!
//! An [`Orchestrator`] owns one instance of each component and the notifier
//! they share:
//!
//! - [`ConstraintValidator`] accepts or rejects actions against a rule set
//! - [`ProtectionChain`] guards registered observers and their rights
//! - [`ReversibilityCoordinator`] runs retried units of work and rolls back
//!
//! ```no_run
//! use warden_engine::{Action, Orchestrator};
//!
//! # async fn demo() {
//! let mut engine = Orchestrator::default();
//! let report = engine.submit_action(Action::new("delete_records", "purge")).await;
//! assert!(!report.accepted());
//! # }
//! ```

mod diagnostics;
mod health;
mod orchestrator;

pub use diagnostics::Diagnostic;
pub use health::{HealthStatus, SystemHealth};
pub use orchestrator::{AutoRollback, Orchestrator, SubmissionReport};

// Re-export the component crates so callers need only this one.
pub use warden_config::{ConfigError, WardenConfig, config_path};
pub use warden_constraint::{
    ComplianceSummary, Constraint, ConstraintApplication, ConstraintValidator, Predicate,
    PredicateError, Validation, Verdict,
};
pub use warden_core::Notifier;
pub use warden_protection::{
    KeywordLayer, LayerFut, LayerVerdict, ProtectionChain, ProtectionLayer, ProtectionResult,
    ProtectionSummary, ViolationFilter,
};
pub use warden_reversibility::{
    AttemptError, BatchRollbackReport, ExecutionOptions, ExecutionOutcome, ReversibilityCoordinator,
    ReversibilityStatus, ReversibleUnit,
};
pub use warden_types::{
    Action, ActionId, ConstraintKind, Notification, Observer, ObserverDescriptor, ObserverId,
    ObserverType, ProtectionLevel, RightName, RightsSet, RightsUpdate, RightsViolation, Severity,
    UnitId, UnitState, Violation,
};
