//! End-to-end walkthroughs of the main engine flows.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Duration, Utc};
use warden_engine::{
    Action, Constraint, ConstraintKind, ExecutionOptions, HealthStatus, Predicate, RightName,
    Severity, UnitState,
};

use crate::common::{engine, register_agent, setter_unit};

#[tokio::test]
async fn deleting_an_observer_is_blocked_by_existence_protection() {
    let mut engine = engine();
    let agent = register_agent(&mut engine);

    let report = engine
        .submit_action(Action::new("delete_observer", "remove agent").targeting([agent]))
        .await;

    assert!(!report.accepted());
    assert_eq!(report.protection.len(), 1);
    let protection = &report.protection[0];
    assert!(!protection.allowed);
    assert_eq!(protection.violations.len(), 1);
    assert_eq!(protection.violations[0].right, RightName::Exist);
    assert_eq!(protection.violations[0].observer_id, agent);
    // targets (+2) push the existence rule past the cap
    assert_eq!(report.validation.violations[0].severity, Severity::MAX);
}

#[tokio::test]
async fn custom_constraint_rejects_matching_kind() {
    let mut engine = engine();
    let application = engine.validator_mut().apply_constraint(Constraint::new(
        ConstraintKind::Custom,
        "No surveillance of inner state",
        Severity::from_static(6),
        Predicate::kind_excludes(&["spy"]),
    ));
    assert!(application.self_consistent());

    let report = engine
        .submit_action(Action::new("spy_on_thoughts", "read private memory"))
        .await;

    assert!(!report.accepted());
    assert_eq!(report.validation.violations.len(), 1);
    assert_eq!(
        report.validation.violations[0].constraint_id,
        application.constraint_id
    );
}

#[tokio::test]
async fn always_succeeding_unit_completes_first_try() {
    let mut engine = engine();
    let counter = Arc::new(AtomicI64::new(0));

    let outcome = engine
        .reversibility_mut()
        .execute_with_rollback(
            setter_unit("set-42", &counter, 42),
            ExecutionOptions::default().max_attempts(3),
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 42);
}

#[tokio::test]
async fn rollback_since_reaches_only_recent_units() {
    let mut engine = engine();
    let now = Utc::now();
    let cells: Vec<Arc<AtomicI64>> = (0..3).map(|_| Arc::new(AtomicI64::new(0))).collect();
    let mut ids = Vec::new();
    for (cell, minutes) in cells.iter().zip([120, 30, 10]) {
        let unit = setter_unit(&format!("{minutes}m-ago"), cell, minutes)
            .with_created_at(now - Duration::minutes(minutes));
        let outcome = engine
            .reversibility_mut()
            .execute_with_rollback(unit, ExecutionOptions::default())
            .await;
        ids.push(outcome.unit_id());
    }

    let report = engine
        .reversibility_mut()
        .rollback_since(now - Duration::hours(1))
        .await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    let coordinator = engine.reversibility();
    assert_eq!(coordinator.unit(ids[0]).unwrap().state, UnitState::Completed);
    assert_eq!(coordinator.unit(ids[1]).unwrap().state, UnitState::RolledBack);
    assert_eq!(coordinator.unit(ids[2]).unwrap().state, UnitState::RolledBack);
    assert_eq!(cells[0].load(Ordering::SeqCst), 120);
    assert_eq!(cells[1].load(Ordering::SeqCst), 0);
    assert_eq!(cells[2].load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn compliance_counts_accepted_actions_only() {
    let mut engine = engine();

    assert!(engine
        .submit_action(Action::new("index_documents", "build search index"))
        .await
        .accepted());
    let rejected = engine
        .submit_action(Action::new("flatten_views", "merge perspectives"))
        .await;
    assert_eq!(rejected.validation.violations.len(), 1);

    let summary = engine.validator().compliance_summary();
    assert_eq!(summary.total_actions, 1);
    assert_eq!(summary.total_violations, 1);
    assert!(summary.compliance_rate.abs() < f64::EPSILON);

    // compliance 0 is below the warning threshold; severity 7 is not critical
    let health = engine.system_health();
    assert_eq!(health.critical_violations, 0);
    assert_eq!(health.status, HealthStatus::Warning);
}
