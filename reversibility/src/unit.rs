//! Units of work and their execution options.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tokio::time;
use warden_core::panic_payload_to_string;
use warden_types::{Snapshot, UnitId};

/// Future returned by an execute or rollback operation.
pub type UnitFut = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// A repeatable execute or rollback operation.
///
/// Called once per attempt, so it must produce a fresh future each time.
pub type UnitFn = Arc<dyn Fn() -> UnitFut + Send + Sync>;

/// Called after every failed attempt with the error and the attempt number.
pub type ErrorHook = Arc<dyn Fn(&AttemptError, u32) + Send + Sync>;

/// Decides whether a unit may be rolled back given its recorded snapshot.
pub type SnapshotCheck = Arc<dyn Fn(&Snapshot) -> bool + Send + Sync>;

pub(crate) fn boxed_op<F, Fut>(op: F) -> UnitFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(op()) as UnitFut)
}

/// Why a single execute or rollback attempt did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error("timed out after {}ms", elapsed.as_millis())]
    Timeout { elapsed: Duration },
    #[error("{message}")]
    Failed { message: String },
    #[error("panicked: {message}")]
    Panicked { message: String },
}

/// Run one invocation of `op`, bounded by `timeout`.
///
/// Panics, whether raised while building the future or while polling it,
/// are caught and reported as [`AttemptError::Panicked`]. When the timeout
/// wins, the future is dropped; work it spawned keeps running.
pub(crate) async fn run_guarded(op: &UnitFn, timeout: Duration) -> Result<(), AttemptError> {
    let fut = match panic::catch_unwind(AssertUnwindSafe(|| op())) {
        Ok(fut) => fut,
        Err(payload) => {
            return Err(AttemptError::Panicked {
                message: panic_payload_to_string(payload.as_ref()),
            });
        }
    };

    match time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Err(_) => Err(AttemptError::Timeout { elapsed: timeout }),
        Ok(Err(payload)) => Err(AttemptError::Panicked {
            message: panic_payload_to_string(payload.as_ref()),
        }),
        Ok(Ok(Err(err))) => Err(AttemptError::Failed {
            message: format!("{err:#}"),
        }),
        Ok(Ok(Ok(()))) => Ok(()),
    }
}

/// A named unit of work paired with the operation that undoes it.
pub struct ReversibleUnit {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    pub(crate) execute: UnitFn,
    pub(crate) rollback: UnitFn,
    pub(crate) metadata: Value,
    pub(crate) created_at: DateTime<Utc>,
}

impl ReversibleUnit {
    pub fn new<E, EFut, R, RFut>(name: impl Into<String>, execute: E, rollback: R) -> Self
    where
        E: Fn() -> EFut + Send + Sync + 'static,
        EFut: Future<Output = anyhow::Result<()>> + Send + 'static,
        R: Fn() -> RFut + Send + Sync + 'static,
        RFut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: UnitId::new(),
            name: name.into(),
            execute: boxed_op(execute),
            rollback: boxed_op(rollback),
            metadata: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Override the creation time used by `rollback_since` and `cleanup`.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ReversibleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReversibleUnit")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Per-call overrides for `execute_with_rollback`.
///
/// Unset limits fall back to the coordinator's configured defaults.
#[derive(Clone, Default)]
pub struct ExecutionOptions {
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    pub on_error: Option<ErrorHook>,
    pub validate_before_rollback: Option<SnapshotCheck>,
    /// Recorded as the unit's snapshot before the first attempt.
    pub before_state: Option<Value>,
}

impl ExecutionOptions {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&AttemptError, u32) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn validate_before_rollback(
        mut self,
        check: impl Fn(&Snapshot) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validate_before_rollback = Some(Arc::new(check));
        self
    }

    pub fn before_state(mut self, state: Value) -> Self {
        self.before_state = Some(state);
        self
    }
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .field("on_error", &self.on_error.is_some())
            .field(
                "validate_before_rollback",
                &self.validate_before_rollback.is_some(),
            )
            .field("before_state", &self.before_state)
            .finish()
    }
}

/// Result of `execute_with_rollback`. Exhausted retries are a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded {
        unit_id: UnitId,
        attempts: u32,
    },
    Failed {
        unit_id: UnitId,
        error: AttemptError,
        attempts: u32,
    },
}

impl ExecutionOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    #[must_use]
    pub fn unit_id(&self) -> UnitId {
        match self {
            Self::Succeeded { unit_id, .. } | Self::Failed { unit_id, .. } => *unit_id,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&AttemptError> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}
