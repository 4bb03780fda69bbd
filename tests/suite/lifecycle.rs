//! Cross-component flows: notifications, diagnostics, health, shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Duration, Utc};
use serde_json::json;
use warden_engine::{
    Action, ActionId, ExecutionOptions, HealthStatus, ReversibleUnit, RightName, RightsUpdate,
    UnitState, ViolationFilter,
};

use crate::common::{drain_names, engine, register_agent, setter_unit};

#[tokio::test]
async fn submission_publishes_in_component_order() {
    let mut engine = engine();
    let agent = register_agent(&mut engine);
    let mut rx = engine.subscribe();

    engine
        .submit_action(Action::new("destroy_agent", "shutdown").targeting([agent]))
        .await;

    assert_eq!(
        drain_names(&mut rx),
        vec![
            "action_rejected",
            "violation_recorded",
            "rights_violation",
            "narrative_entry_added",
        ]
    );
}

#[tokio::test]
async fn emergency_shutdown_rolls_back_the_last_hour() {
    let mut engine = engine();
    let stale = Arc::new(AtomicI64::new(0));
    let fresh = Arc::new(AtomicI64::new(0));

    let old = setter_unit("stale", &stale, 1).with_created_at(Utc::now() - Duration::hours(3));
    engine
        .reversibility_mut()
        .execute_with_rollback(old, ExecutionOptions::default())
        .await;
    engine
        .reversibility_mut()
        .execute_with_rollback(setter_unit("fresh", &fresh, 2), ExecutionOptions::default())
        .await;
    let action = ActionId::new();
    engine
        .reversibility_mut()
        .register_rollback(action, "wedged", || async {
            Err(anyhow::anyhow!("lock held"))
        });

    let report = engine.emergency_shutdown().await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(stale.load(Ordering::SeqCst), 1);
    assert_eq!(fresh.load(Ordering::SeqCst), 0);

    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].unit_name, "wedged");
    // one failure out of two attempts drops below the rollback threshold
    assert_eq!(engine.system_health().status, HealthStatus::Warning);
}

#[tokio::test]
async fn critical_violation_marks_system_critical() {
    let mut engine = engine();
    assert_eq!(engine.system_health().status, HealthStatus::Healthy);

    engine
        .submit_action(Action::new("coerce_consensus", "override").irreversible())
        .await;

    let health = engine.system_health();
    assert_eq!(health.status, HealthStatus::Critical);
    assert_eq!(health.critical_violations, 1);
    assert_eq!(health.active_constraints, 3);
}

#[tokio::test]
async fn observer_lifecycle_keeps_history() {
    let mut engine = engine();
    let agent = register_agent(&mut engine);

    engine
        .protection_mut()
        .update_observer_rights(agent, RightsUpdate::set(RightName::Privacy, false));
    engine
        .protection_mut()
        .check_action("prune_redundant_agents", &[agent])
        .await;
    assert!(
        engine
            .protection_mut()
            .deregister_observer(agent, "migration complete")
            .await
    );

    let protection = engine.protection();
    assert!(protection.observer(agent).is_none());
    assert_eq!(protection.observer_count(), 0);
    let history = protection.violations(&ViolationFilter::default().observer(agent));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].right, RightName::NotOptimizedAway);
    // registration, rights update, blocked action, deregistration
    assert_eq!(protection.observer_narrative(agent).unwrap().len(), 4);
}

#[tokio::test]
async fn snapshots_are_tracked_through_execution() {
    let mut engine = engine();
    let mut rx = engine.subscribe();
    let unit = ReversibleUnit::new("migrate", || async { Ok(()) }, || async { Ok(()) })
        .with_metadata(json!({"table": "accounts"}));

    let outcome = engine
        .reversibility_mut()
        .execute_with_rollback(
            unit,
            ExecutionOptions::default().before_state(json!({"rows": 10})),
        )
        .await;
    let id = outcome.unit_id();
    assert!(engine.reversibility_mut().update_snapshot(id, json!({"rows": 12})));

    assert_eq!(
        drain_names(&mut rx),
        vec!["snapshot_created", "unit_completed", "snapshot_updated"]
    );
    let snapshot = engine.reversibility().snapshot(id).unwrap();
    assert_eq!(snapshot.before["rows"], 10);
    assert_eq!(snapshot.after.as_ref().unwrap()["rows"], 12);
    assert_eq!(
        engine.reversibility().unit(id).unwrap().metadata["table"],
        "accounts"
    );
    assert!(engine.reversibility().reversibility_status().has_snapshots);
}

#[tokio::test]
async fn cleanup_drops_only_old_terminal_units() {
    let mut engine = engine();
    let cell = Arc::new(AtomicI64::new(0));
    let old = setter_unit("old", &cell, 1).with_created_at(Utc::now() - Duration::days(10));
    let old_id = engine
        .reversibility_mut()
        .execute_with_rollback(old, ExecutionOptions::default())
        .await
        .unit_id();
    let recent_id = engine
        .reversibility_mut()
        .execute_with_rollback(setter_unit("recent", &cell, 2), ExecutionOptions::default())
        .await
        .unit_id();

    let removed = engine
        .reversibility_mut()
        .cleanup(Utc::now() - Duration::days(1));

    assert_eq!(removed, 1);
    assert!(engine.reversibility().unit(old_id).is_none());
    assert_eq!(
        engine.reversibility().unit(recent_id).unwrap().state,
        UnitState::Completed
    );
}
