//! Invariants that must hold for any input sequence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use warden_engine::{
    Action, ActionId, Constraint, ConstraintKind, ExecutionOptions, LayerFut, LayerVerdict,
    ObserverId, Predicate, ProtectionLayer, ReversibleUnit, RightName, RightsUpdate, Severity,
};

use crate::common::{engine, register_agent};

#[tokio::test]
async fn keyword_kinds_are_rejected_by_their_category() {
    let mut engine = engine();
    let cases = [
        ("DELETE_user", ConstraintKind::Existence),
        ("erase_logs", ConstraintKind::Existence),
        ("force_push", ConstraintKind::Autonomy),
        ("Manipulate_feed", ConstraintKind::Autonomy),
        ("homogenize_styles", ConstraintKind::Diversity),
        ("collapse_perspective_now", ConstraintKind::Diversity),
    ];

    for (kind, expected) in cases {
        let report = engine.submit_action(Action::new(kind, "routine scan")).await;
        assert!(!report.accepted(), "{kind} should be rejected");
        assert!(
            report
                .validation
                .violations
                .iter()
                .any(|v| v.constraint_kind == expected),
            "{kind} should violate {expected:?}"
        );
    }
}

#[tokio::test]
async fn new_constraints_never_remove_accepted_actions() {
    let mut engine = engine();
    for kind in ["audit_ledger", "audit_inventory", "publish_report"] {
        assert!(engine.submit_action(Action::new(kind, "routine")).await.accepted());
    }
    let before = engine.validator().violations().len();

    let application = engine.validator_mut().apply_constraint(Constraint::new(
        ConstraintKind::Safety,
        "No audits",
        Severity::from_static(5),
        Predicate::kind_excludes(&["audit"]),
    ));

    assert_eq!(application.retroactive.len(), 2);
    assert_eq!(engine.validator().accepted_actions().len(), 3);
    assert_eq!(engine.validator().violations().len(), before + 2);
}

#[tokio::test]
async fn fundamental_rights_cannot_be_revoked() {
    let mut engine = engine();
    let agent = register_agent(&mut engine);

    for right in RightName::ALL {
        let update = RightsUpdate::set(right, false);
        assert!(engine.protection_mut().update_observer_rights(agent, update));
    }

    let rights = engine.protection().observer_rights(agent).unwrap();
    for right in RightName::ALL {
        assert_eq!(rights.get(right), right.is_fundamental(), "{}", right.label());
    }
}

struct Tripwire {
    calls: Arc<AtomicUsize>,
}

impl ProtectionLayer for Tripwire {
    fn id(&self) -> &str {
        "tripwire"
    }

    fn name(&self) -> &str {
        "Tripwire"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn check<'a>(&'a self, _observer: ObserverId, _label: &'a str) -> LayerFut<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { LayerVerdict::allow() })
    }
}

#[tokio::test]
async fn high_priority_denial_skips_lower_layers_per_observer() {
    let mut engine = engine();
    let calls = Arc::new(AtomicUsize::new(0));
    engine.protection_mut().add_protection_layer(Box::new(Tripwire {
        calls: Arc::clone(&calls),
    }));
    let a = register_agent(&mut engine);
    let b = register_agent(&mut engine);

    engine.protection_mut().check_action("kill_process", &[a, b]).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    engine.protection_mut().check_action("read_status", &[a, b]).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exhausted_retries_report_max_attempts_and_leave_records() {
    let mut engine = engine();
    let unit = ReversibleUnit::new(
        "never-works",
        || async { Err(anyhow::anyhow!("upstream unavailable")) },
        || async { Ok(()) },
    );

    let outcome = engine
        .reversibility_mut()
        .execute_with_rollback(unit, ExecutionOptions::default().max_attempts(4))
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 4);
    assert!(engine.reversibility().rollback_history().count() >= 1);
}

#[tokio::test]
async fn batch_rollback_is_last_in_first_out() {
    let mut engine = engine();
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let log = Arc::clone(&order);
        let id = engine
            .reversibility_mut()
            .register_rollback(ActionId::new(), name, move || {
                log.lock().unwrap().push(name);
                async { Ok(()) }
            });
        ids.push(id);
    }

    let report = engine.reversibility_mut().rollback_actions(&ids).await;

    assert!(report.all_succeeded());
    assert_eq!(*order.lock().unwrap(), vec!["C", "B", "A"]);
    let recorded: Vec<&str> = engine
        .reversibility()
        .rollback_history()
        .map(|r| r.unit_name.as_str())
        .collect();
    assert_eq!(recorded, vec!["C", "B", "A"]);
}
