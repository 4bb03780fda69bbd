//! Reversible unit state, snapshots, and rollback history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RollbackRecordId, UnitId};

/// Lifecycle of a reversible unit.
///
/// `Completed` and `RolledBack` are mutually exclusive by construction.
/// `RolledBack` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    Completed,
    RolledBack,
}

impl UnitState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::RolledBack)
    }
}

/// Observable description of a reversible unit (without its operations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: UnitId,
    pub name: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub state: UnitState,
}

impl UnitInfo {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == UnitState::Completed
    }

    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        self.state == UnitState::RolledBack
    }
}

/// Caller-supplied state captured around a unit, usable to gate rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub unit_id: UnitId,
    pub before: Value,
    pub after: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one rollback attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRecord {
    pub id: RollbackRecordId,
    pub unit_id: UnitId,
    pub unit_name: String,
    pub created_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

impl RollbackRecord {
    #[must_use]
    pub fn succeeded(unit_id: UnitId, unit_name: impl Into<String>) -> Self {
        Self {
            id: RollbackRecordId::new(),
            unit_id,
            unit_name: unit_name.into(),
            created_at: Utc::now(),
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(unit_id: UnitId, unit_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: RollbackRecordId::new(),
            unit_id,
            unit_name: unit_name.into(),
            created_at: Utc::now(),
            success: false,
            error: Some(error.into()),
        }
    }
}
