//! Severity scale shared by constraint and rights violations.
//!
//! Values outside `1..=10` are unrepresentable; escalation saturates at
//! [`Severity::MAX`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("severity must be between 1 and 10, got {0}")]
pub struct SeverityError(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const MIN: Severity = Severity(1);
    pub const MAX: Severity = Severity(10);
    /// Threshold at and above which a violation counts as critical.
    pub const CRITICAL: Severity = Severity(8);

    pub fn new(value: u8) -> Result<Self, SeverityError> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SeverityError(value))
        }
    }

    /// Build a severity from a compile-time literal.
    ///
    /// Panics if the value is out of range, which fails const evaluation.
    #[must_use]
    pub const fn from_static(value: u8) -> Self {
        assert!(value >= 1 && value <= 10, "severity out of range");
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Raise by `amount`, capped at [`Severity::MAX`].
    #[must_use]
    pub fn escalate(self, amount: u8) -> Self {
        Self(self.0.saturating_add(amount).min(Self::MAX.0))
    }

    #[must_use]
    pub fn is_critical(self) -> bool {
        self >= Self::CRITICAL
    }
}

impl TryFrom<u8> for Severity {
    type Error = SeverityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.0
    }
}
