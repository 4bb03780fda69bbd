//! Declarative predicates over actions.
//!
//! Built-in rules are data (`KindExcludes` with a keyword set) rather than
//! ad hoc string checks. `Custom` covers everything else; a custom predicate
//! that errors or panics is treated as a failed check.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use thiserror::Error;
use warden_core::{KeywordSet, panic_payload_to_string};
use warden_types::Action;

/// Error returned by a custom predicate that could not reach a verdict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PredicateError {
    message: String,
}

impl PredicateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type PredicateFn = Arc<dyn Fn(&Action) -> Result<bool, PredicateError> + Send + Sync>;

/// What an action must satisfy to pass a constraint.
#[derive(Clone)]
pub enum Predicate {
    /// Passes unless the action kind contains one of the keywords.
    KindExcludes(KeywordSet),
    /// Passes only if the action kind contains one of the keywords.
    KindIncludes(KeywordSet),
    /// Passes only for reversible actions.
    RequiresReversible,
    Custom(PredicateFn),
}

/// Result of evaluating a predicate against one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    /// The predicate errored or panicked; counted as a failure.
    Faulted(String),
}

impl Verdict {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl Predicate {
    /// Rejects kinds containing any of `keywords`.
    #[must_use]
    pub fn kind_excludes(keywords: &[&'static str]) -> Self {
        Self::KindExcludes(KeywordSet::from_static(keywords))
    }

    /// Accepts only kinds containing one of `keywords`.
    #[must_use]
    pub fn kind_includes(keywords: &[&'static str]) -> Self {
        Self::KindIncludes(KeywordSet::from_static(keywords))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Action) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    #[must_use]
    pub fn evaluate(&self, action: &Action) -> Verdict {
        let passed = match self {
            Self::KindExcludes(set) => !set.matches(&action.kind),
            Self::KindIncludes(set) => set.matches(&action.kind),
            Self::RequiresReversible => action.reversible,
            Self::Custom(f) => match catch_unwind(AssertUnwindSafe(|| f(action))) {
                Ok(Ok(passed)) => passed,
                Ok(Err(err)) => return Verdict::Faulted(err.to_string()),
                Err(payload) => {
                    let message = panic_payload_to_string(payload.as_ref());
                    return Verdict::Faulted(format!("predicate panicked: {message}"));
                }
            },
        };
        if passed { Verdict::Pass } else { Verdict::Fail }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindExcludes(set) => f.debug_tuple("KindExcludes").field(&set.keywords()).finish(),
            Self::KindIncludes(set) => f.debug_tuple("KindIncludes").field(&set.keywords()).finish(),
            Self::RequiresReversible => f.write_str("RequiresReversible"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
