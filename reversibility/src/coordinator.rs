//! ReversibilityCoordinator - retried execution with compensating rollback.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use warden_config::ReversibilityConfig;
use warden_core::{Notifier, percentage_or_full};
use warden_types::{ActionId, Notification, RollbackRecord, Snapshot, UnitId, UnitInfo, UnitState};

use crate::unit::{
    ExecutionOptions, ExecutionOutcome, ReversibleUnit, SnapshotCheck, UnitFn, boxed_op,
    run_guarded,
};

struct UnitEntry {
    info: UnitInfo,
    /// Dropped once the unit is terminally rolled back.
    rollback: Option<UnitFn>,
    timeout: Duration,
    validate: Option<SnapshotCheck>,
}

/// Outcome of one entry in a batch rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub unit_id: UnitId,
    pub rolled_back: bool,
}

/// Per-id results of `rollback_actions`, in the order rollbacks ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRollbackReport {
    pub outcomes: Vec<RollbackOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchRollbackReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReversibilityStatus {
    pub completed: usize,
    pub rolled_back: usize,
    pub pending: usize,
    /// Percentage of retained rollback records that succeeded; 100 when empty.
    pub rollback_success_rate: f64,
    pub has_snapshots: bool,
    pub history_len: usize,
}

pub struct ReversibilityCoordinator {
    units: HashMap<UnitId, UnitEntry>,
    /// Registration order, used by `rollback_since`.
    order: Vec<UnitId>,
    snapshots: HashMap<UnitId, Snapshot>,
    history: VecDeque<RollbackRecord>,
    max_attempts: u32,
    timeout: Duration,
    max_history: usize,
    notifier: Notifier,
}

impl ReversibilityCoordinator {
    #[must_use]
    pub fn new(config: &ReversibilityConfig, notifier: Notifier) -> Self {
        Self {
            units: HashMap::new(),
            order: Vec::new(),
            snapshots: HashMap::new(),
            history: VecDeque::new(),
            max_attempts: config.max_attempts.max(1),
            timeout: config.timeout(),
            max_history: config.max_rollback_history,
            notifier,
        }
    }

    fn insert_unit(&mut self, entry: UnitEntry) {
        let id = entry.info.id;
        if self.units.insert(id, entry).is_none() {
            self.order.push(id);
        }
    }

    /// Register the procedure that undoes an already-performed action.
    ///
    /// The action becomes a completed unit whose id is derived from the
    /// action id, so `rollback_action` can find it later. Registering again
    /// for the same action replaces the procedure, unless the action was
    /// already rolled back.
    pub fn register_rollback<F, Fut>(
        &mut self,
        action_id: ActionId,
        name: impl Into<String>,
        procedure: F,
    ) -> UnitId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = UnitId::from(action_id);
        let name = name.into();
        if self
            .units
            .get(&id)
            .is_some_and(|entry| entry.info.state == UnitState::RolledBack)
        {
            tracing::warn!(
                unit = %id,
                name = %name,
                "Action already rolled back; registration refused"
            );
            return id;
        }
        tracing::debug!(unit = %id, name = %name, "Rollback procedure registered");
        self.insert_unit(UnitEntry {
            info: UnitInfo {
                id,
                name,
                metadata: Value::Null,
                created_at: Utc::now(),
                state: UnitState::Completed,
            },
            rollback: Some(boxed_op(procedure)),
            timeout: self.timeout,
            validate: None,
        });
        id
    }

    /// Roll back the procedure registered for `action_id`.
    pub async fn rollback_action(&mut self, action_id: ActionId) -> bool {
        self.rollback(UnitId::from(action_id)).await
    }

    /// Run `unit` with bounded retries, compensating after each failure.
    ///
    /// Every failed attempt is followed by a rollback pass. The first pass
    /// that succeeds rolls the unit back terminally and drops its rollback
    /// op, so remaining attempts run without compensation and later passes
    /// are no-ops. A unit never rolls back more than once.
    pub async fn execute_with_rollback(
        &mut self,
        unit: ReversibleUnit,
        options: ExecutionOptions,
    ) -> ExecutionOutcome {
        let max_attempts = options.max_attempts.unwrap_or(self.max_attempts).max(1);
        let timeout = options.timeout.unwrap_or(self.timeout);
        let ReversibleUnit {
            id,
            name,
            execute,
            rollback,
            metadata,
            created_at,
        } = unit;

        self.insert_unit(UnitEntry {
            info: UnitInfo {
                id,
                name: name.clone(),
                metadata,
                created_at,
                state: UnitState::Pending,
            },
            rollback: Some(rollback),
            timeout,
            validate: options.validate_before_rollback.clone(),
        });
        if let Some(before) = options.before_state.clone() {
            self.record_snapshot(id, before);
        }

        let mut attempt = 0;
        let error = loop {
            attempt += 1;
            match run_guarded(&execute, timeout).await {
                Ok(()) => {
                    let info = self.set_state(id, UnitState::Completed);
                    tracing::info!(unit = %id, name = %name, attempt, "Unit completed");
                    if let Some(unit) = info {
                        self.notifier.publish(Notification::UnitCompleted {
                            unit,
                            attempts: attempt,
                        });
                    }
                    return ExecutionOutcome::Succeeded {
                        unit_id: id,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        unit = %id,
                        name = %name,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Unit attempt failed"
                    );
                    if let Some(entry) = self.units.get(&id) {
                        self.notifier.publish(Notification::UnitErrored {
                            unit: entry.info.clone(),
                            attempt,
                            error: err.to_string(),
                        });
                    }
                    if let Some(hook) = &options.on_error {
                        hook(&err, attempt);
                    }
                    if attempt >= max_attempts {
                        break err;
                    }
                    self.rollback(id).await;
                }
            }
        };

        self.rollback(id).await;
        ExecutionOutcome::Failed {
            unit_id: id,
            error,
            attempts: max_attempts,
        }
    }

    /// `RolledBack` is terminal; a late success after compensation keeps it.
    fn set_state(&mut self, id: UnitId, state: UnitState) -> Option<UnitInfo> {
        let entry = self.units.get_mut(&id)?;
        if entry.info.state == UnitState::RolledBack {
            tracing::warn!(unit = %id, "Unit succeeded after its rollback already ran");
        } else {
            entry.info.state = state;
        }
        Some(entry.info.clone())
    }

    /// Terminally roll back one unit.
    ///
    /// Returns false when the unit is unknown, already rolled back, vetoed by
    /// its snapshot check, or when the rollback op fails.
    pub async fn rollback(&mut self, id: UnitId) -> bool {
        let Some(entry) = self.units.get(&id) else {
            tracing::warn!(unit = %id, "No rollback procedure registered");
            return false;
        };
        if entry.info.state == UnitState::RolledBack {
            tracing::warn!(unit = %id, "Unit already rolled back");
            return false;
        }
        let Some(op) = entry.rollback.clone() else {
            tracing::warn!(unit = %id, "Unit has no rollback operation");
            return false;
        };
        if let (Some(check), Some(snapshot)) = (&entry.validate, self.snapshots.get(&id))
            && !check(snapshot)
        {
            tracing::warn!(unit = %id, "Rollback vetoed by snapshot validation");
            return false;
        }
        let name = entry.info.name.clone();
        let timeout = entry.timeout;

        self.notifier.publish(Notification::RollbackStarted {
            unit_id: id,
            unit_name: name.clone(),
        });

        match run_guarded(&op, timeout).await {
            Ok(()) => {
                if let Some(entry) = self.units.get_mut(&id) {
                    entry.info.state = UnitState::RolledBack;
                    entry.rollback = None;
                }
                tracing::info!(unit = %id, name = %name, "Rollback completed");
                let record = RollbackRecord::succeeded(id, name);
                self.push_record(record.clone());
                self.notifier
                    .publish(Notification::RollbackCompleted { record });
                true
            }
            Err(err) => {
                tracing::error!(unit = %id, name = %name, error = %err, "Rollback failed");
                let record = RollbackRecord::failed(id, name, err.to_string());
                self.push_record(record.clone());
                self.notifier.publish(Notification::RollbackFailed { record });
                false
            }
        }
    }

    fn push_record(&mut self, record: RollbackRecord) {
        self.history.push_back(record);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// Roll back `ids` last to first, continuing past failures.
    pub async fn rollback_actions(&mut self, ids: &[UnitId]) -> BatchRollbackReport {
        let mut report = BatchRollbackReport::default();
        for &unit_id in ids.iter().rev() {
            let rolled_back = self.rollback(unit_id).await;
            if rolled_back {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            report.outcomes.push(RollbackOutcome {
                unit_id,
                rolled_back,
            });
        }
        report
    }

    /// Roll back every unit created at or after `since`, newest registration first.
    pub async fn rollback_since(&mut self, since: DateTime<Utc>) -> BatchRollbackReport {
        let ids: Vec<UnitId> = self
            .order
            .iter()
            .filter_map(|id| self.units.get(id))
            .filter(|entry| {
                entry.info.created_at >= since && entry.info.state != UnitState::RolledBack
            })
            .map(|entry| entry.info.id)
            .collect();
        tracing::info!(count = ids.len(), since = %since, "Rolling back recent units");
        self.rollback_actions(&ids).await
    }

    #[must_use]
    pub fn reversibility_status(&self) -> ReversibilityStatus {
        let (mut completed, mut rolled_back, mut pending) = (0, 0, 0);
        for entry in self.units.values() {
            match entry.info.state {
                UnitState::Completed => completed += 1,
                UnitState::RolledBack => rolled_back += 1,
                UnitState::Pending => pending += 1,
            }
        }
        let successes = self.history.iter().filter(|r| r.success).count();

        ReversibilityStatus {
            completed,
            rolled_back,
            pending,
            rollback_success_rate: percentage_or_full(successes, self.history.len()),
            has_snapshots: !self.snapshots.is_empty(),
            history_len: self.history.len(),
        }
    }

    /// Drop terminal units created before `older_than`, with their snapshots.
    pub fn cleanup(&mut self, older_than: DateTime<Utc>) -> usize {
        let stale: Vec<UnitId> = self
            .units
            .values()
            .filter(|entry| entry.info.state.is_terminal() && entry.info.created_at < older_than)
            .map(|entry| entry.info.id)
            .collect();

        for id in &stale {
            self.units.remove(id);
            self.snapshots.remove(id);
        }
        self.order.retain(|id| self.units.contains_key(id));

        let removed = stale.len();
        tracing::info!(removed, cutoff = %older_than, "Cleanup completed");
        self.notifier.publish(Notification::CleanupCompleted {
            removed,
            cutoff: older_than,
        });
        removed
    }

    /// Record the state a unit started from. Replaces any earlier snapshot.
    ///
    /// Returns false when the unit is unknown.
    pub fn record_snapshot(&mut self, unit_id: UnitId, before: Value) -> bool {
        if !self.units.contains_key(&unit_id) {
            tracing::warn!(unit = %unit_id, "Snapshot for unknown unit ignored");
            return false;
        }
        let now = Utc::now();
        let snapshot = Snapshot {
            unit_id,
            before,
            after: None,
            created_at: now,
            updated_at: now,
        };
        self.snapshots.insert(unit_id, snapshot.clone());
        self.notifier
            .publish(Notification::SnapshotCreated { snapshot });
        true
    }

    /// Attach the resulting state to an existing snapshot.
    ///
    /// Returns false when the unit has no snapshot.
    pub fn update_snapshot(&mut self, unit_id: UnitId, after: Value) -> bool {
        let Some(snapshot) = self.snapshots.get_mut(&unit_id) else {
            return false;
        };
        snapshot.after = Some(after);
        snapshot.updated_at = Utc::now();
        let snapshot = snapshot.clone();
        self.notifier
            .publish(Notification::SnapshotUpdated { snapshot });
        true
    }

    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&UnitInfo> {
        self.units.get(&id).map(|entry| &entry.info)
    }

    #[must_use]
    pub fn snapshot(&self, id: UnitId) -> Option<&Snapshot> {
        self.snapshots.get(&id)
    }

    /// Retained rollback records, oldest first.
    pub fn rollback_history(&self) -> impl Iterator<Item = &RollbackRecord> {
        self.history.iter()
    }

    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}
