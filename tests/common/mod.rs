//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use warden_engine::{
    Notification, ObserverDescriptor, ObserverId, ObserverType, Orchestrator, ReversibleUnit,
};

/// Route engine logs through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A default engine with tracing wired up.
pub fn engine() -> Orchestrator {
    init_tracing();
    Orchestrator::default()
}

pub fn register_agent(engine: &mut Orchestrator) -> ObserverId {
    engine
        .protection_mut()
        .register_observer(ObserverDescriptor::new(ObserverType::AiAgent).conscious(true))
}

/// Unit whose execute stores `value` into `cell` and whose rollback resets it.
pub fn setter_unit(name: &str, cell: &Arc<AtomicI64>, value: i64) -> ReversibleUnit {
    let (exec, undo) = (Arc::clone(cell), Arc::clone(cell));
    ReversibleUnit::new(
        name,
        move || {
            let cell = Arc::clone(&exec);
            async move {
                cell.store(value, Ordering::SeqCst);
                Ok(())
            }
        },
        move || {
            let cell = Arc::clone(&undo);
            async move {
                cell.store(0, Ordering::SeqCst);
                Ok(())
            }
        },
    )
}

/// Event names received so far, in publish order.
pub fn drain_names(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    names
}
