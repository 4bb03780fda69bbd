//! Core domain types for Warden.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the engine.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod action;
mod ids;
mod notification;
mod observer;
mod reversible;
mod severity;

pub use action::{Action, ConstraintKind, Violation};
pub use ids::{ActionId, ConstraintId, ObserverId, RollbackRecordId, UnitId, ViolationId};
pub use notification::{ConstraintInfo, Notification};
pub use observer::{
    NarrativeEntry, Observer, ObserverDescriptor, ObserverType, ProtectionLevel, RightName,
    RightsSet, RightsUpdate, RightsViolation,
};
pub use reversible::{RollbackRecord, Snapshot, UnitInfo, UnitState};
pub use severity::{Severity, SeverityError};
