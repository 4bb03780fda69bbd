//! Reversible execution for Warden.
//!
//! A [`ReversibleUnit`] pairs an execute operation with the rollback that
//! undoes it. The [`ReversibilityCoordinator`] runs units with bounded,
//! time-limited retries, keeps a bounded history of rollback attempts, and
//! also holds rollback procedures registered for individual actions.

mod coordinator;
mod unit;

pub use coordinator::{
    BatchRollbackReport, ReversibilityCoordinator, ReversibilityStatus, RollbackOutcome,
};
pub use unit::{
    AttemptError, ErrorHook, ExecutionOptions, ExecutionOutcome, ReversibleUnit, SnapshotCheck,
    UnitFn, UnitFut,
};
