//! System health snapshot.

use warden_config::HealthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemHealth {
    pub compliance_rate: f64,
    pub rollback_success_rate: f64,
    pub active_constraints: usize,
    pub critical_violations: usize,
    pub status: HealthStatus,
}

impl SystemHealth {
    /// Classify the given rates against the configured thresholds.
    ///
    /// Any critical violation makes the system critical regardless of rates.
    #[must_use]
    pub fn assess(
        config: &HealthConfig,
        compliance_rate: f64,
        rollback_success_rate: f64,
        active_constraints: usize,
        critical_violations: usize,
    ) -> Self {
        let status = if critical_violations > 0 {
            HealthStatus::Critical
        } else if compliance_rate < config.compliance_warning_threshold
            || rollback_success_rate < config.rollback_warning_threshold
        {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        Self {
            compliance_rate,
            rollback_success_rate,
            active_constraints,
            critical_violations,
            status,
        }
    }
}
