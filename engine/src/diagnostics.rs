//! Rollback failure diagnostics.
//!
//! The orchestrator keeps its own filtered subscription to the shared
//! notifier, so only `RollbackFailed` events queue up, and turns each one
//! into a [`Diagnostic`] whichever component path triggered the rollback.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use warden_core::Notifier;
use warden_types::{Notification, RollbackRecord, UnitId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub unit_id: UnitId,
    pub unit_name: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

impl Diagnostic {
    fn from_record(record: RollbackRecord) -> Self {
        Self {
            unit_id: record.unit_id,
            unit_name: record.unit_name,
            error: record.error.unwrap_or_else(|| "unknown error".to_string()),
            at: record.created_at,
        }
    }
}

/// Bounded log of rollback failures fed from a notifier subscription.
pub(crate) struct DiagnosticLog {
    events: mpsc::UnboundedReceiver<Notification>,
    entries: VecDeque<Diagnostic>,
    capacity: usize,
}

fn is_rollback_failure(event: &Notification) -> bool {
    matches!(event, Notification::RollbackFailed { .. })
}

impl DiagnosticLog {
    pub(crate) fn subscribe(notifier: &Notifier, capacity: usize) -> Self {
        Self {
            events: notifier.subscribe_filtered(is_rollback_failure),
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Pull every pending notification, keeping only rollback failures.
    pub(crate) fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let Notification::RollbackFailed { record } = event else {
                continue;
            };
            let diagnostic = Diagnostic::from_record(record);
            tracing::error!(
                unit = %diagnostic.unit_id,
                name = %diagnostic.unit_name,
                error = %diagnostic.error,
                "Rollback failure diagnostic"
            );
            self.entries.push_back(diagnostic);
            while self.entries.len() > self.capacity {
                self.entries.pop_front();
            }
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.events.len()
    }
}
