//! Notifications published on every state transition.
//!
//! These are the only outward-facing surface of the engine. Collaborators
//! (dashboards, log shippers) subscribe and serialize them as they see fit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Action, ConstraintId, ConstraintKind, NarrativeEntry, Observer, ObserverId, RightsSet,
    RightsViolation, RollbackRecord, Severity, Snapshot, UnitId, UnitInfo, Violation,
};

/// Observable description of a constraint (without its predicate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintInfo {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub description: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    ConstraintAdded {
        constraint: ConstraintInfo,
    },
    ConstraintRemoved {
        constraint: ConstraintInfo,
    },
    ActionAccepted {
        action: Action,
    },
    ActionRejected {
        action: Action,
        violations: Vec<Violation>,
    },
    ViolationRecorded {
        violation: Violation,
    },
    ObserverRegistered {
        observer: Observer,
        rights: RightsSet,
    },
    ObserverDeregistered {
        observer: Observer,
        reason: String,
    },
    RightsUpdated {
        observer_id: ObserverId,
        rights: RightsSet,
    },
    RightsViolation {
        violation: RightsViolation,
    },
    ProtectionLayerAdded {
        layer_id: String,
        name: String,
        priority: u8,
    },
    NarrativeEntryAdded {
        entry: NarrativeEntry,
    },
    UnitCompleted {
        unit: UnitInfo,
        attempts: u32,
    },
    UnitErrored {
        unit: UnitInfo,
        attempt: u32,
        error: String,
    },
    RollbackStarted {
        unit_id: UnitId,
        unit_name: String,
    },
    RollbackCompleted {
        record: RollbackRecord,
    },
    RollbackFailed {
        record: RollbackRecord,
    },
    SnapshotCreated {
        snapshot: Snapshot,
    },
    SnapshotUpdated {
        snapshot: Snapshot,
    },
    CleanupCompleted {
        removed: usize,
        cutoff: DateTime<Utc>,
    },
}

impl Notification {
    /// Stable snake_case name of the variant, used for log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConstraintAdded { .. } => "constraint_added",
            Self::ConstraintRemoved { .. } => "constraint_removed",
            Self::ActionAccepted { .. } => "action_accepted",
            Self::ActionRejected { .. } => "action_rejected",
            Self::ViolationRecorded { .. } => "violation_recorded",
            Self::ObserverRegistered { .. } => "observer_registered",
            Self::ObserverDeregistered { .. } => "observer_deregistered",
            Self::RightsUpdated { .. } => "rights_updated",
            Self::RightsViolation { .. } => "rights_violation",
            Self::ProtectionLayerAdded { .. } => "protection_layer_added",
            Self::NarrativeEntryAdded { .. } => "narrative_entry_added",
            Self::UnitCompleted { .. } => "unit_completed",
            Self::UnitErrored { .. } => "unit_errored",
            Self::RollbackStarted { .. } => "rollback_started",
            Self::RollbackCompleted { .. } => "rollback_completed",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::SnapshotCreated { .. } => "snapshot_created",
            Self::SnapshotUpdated { .. } => "snapshot_updated",
            Self::CleanupCompleted { .. } => "cleanup_completed",
        }
    }
}
