//! Orchestrator - one engine instance wiring the three components together.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use warden_config::{ConfigError, WardenConfig};
use warden_constraint::{ConstraintValidator, Validation};
use warden_core::Notifier;
use warden_protection::{ProtectionChain, ProtectionResult};
use warden_reversibility::{BatchRollbackReport, ReversibilityCoordinator};
use warden_types::{Action, Notification, ObserverId, ViolationId};

use crate::diagnostics::{Diagnostic, DiagnosticLog};
use crate::health::SystemHealth;

/// One automatic rollback triggered by a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoRollback {
    pub violation_id: ViolationId,
    pub rolled_back: bool,
}

/// Everything that happened while submitting one action.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub validation: Validation,
    /// One protection replay per violation when the action targeted observers.
    pub protection: Vec<ProtectionResult>,
    pub rollbacks: Vec<AutoRollback>,
}

impl SubmissionReport {
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.validation.valid
    }
}

pub struct Orchestrator {
    config: WardenConfig,
    notifier: Notifier,
    validator: ConstraintValidator,
    protection: ProtectionChain,
    reversibility: ReversibilityCoordinator,
    diagnostics: DiagnosticLog,
}

impl Orchestrator {
    /// Build an engine whose components share one notifier.
    #[must_use]
    pub fn new(config: WardenConfig) -> Self {
        let notifier = Notifier::new();
        let diagnostics = DiagnosticLog::subscribe(&notifier, config.health.max_diagnostics);
        let validator = ConstraintValidator::with_defaults(&config.constraints, notifier.clone());
        let protection = ProtectionChain::with_defaults(&config.protection, notifier.clone());
        let reversibility = ReversibilityCoordinator::new(&config.reversibility, notifier.clone());

        tracing::info!(
            constraints = validator.constraints().len(),
            layers = protection.layer_names().len(),
            auto_rollback = config.constraints.auto_rollback,
            "Orchestrator initialized"
        );

        Self {
            config,
            notifier,
            validator,
            protection,
            reversibility,
            diagnostics,
        }
    }

    /// Build an engine from `~/.warden/config.toml`, or defaults if absent.
    pub fn from_default_config() -> Result<Self, ConfigError> {
        let config = WardenConfig::load()?.unwrap_or_default();
        Ok(Self::new(config))
    }

    /// Receive every notification published after this call.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification> {
        self.notifier.subscribe()
    }

    /// Validate `action`, surface rights violations for its targets, and
    /// roll it back for each violation that asks for it.
    pub async fn submit_action(&mut self, action: Action) -> SubmissionReport {
        let kind = action.kind.clone();
        let action_id = action.id;
        let targets: Vec<ObserverId> = action.targets.iter().copied().collect();

        let validation = self.validator.validate_action(action);

        let mut protection = Vec::new();
        if !targets.is_empty() {
            for violation in &validation.violations {
                tracing::debug!(
                    action = %action_id,
                    violation = %violation.id,
                    targets = targets.len(),
                    "Replaying protection for violation"
                );
                protection.push(self.protection.check_action(&kind, &targets).await);
            }
        }

        let candidates: Vec<ViolationId> =
            validation.rollback_candidates().map(|v| v.id).collect();
        let mut rollbacks = Vec::with_capacity(candidates.len());
        for violation_id in candidates {
            let rolled_back = self.reversibility.rollback_action(action_id).await;
            if !rolled_back {
                tracing::warn!(
                    action = %action_id,
                    violation = %violation_id,
                    "Automatic rollback did not run"
                );
            }
            rollbacks.push(AutoRollback {
                violation_id,
                rolled_back,
            });
        }
        self.diagnostics.drain();

        SubmissionReport {
            validation,
            protection,
            rollbacks,
        }
    }

    #[must_use]
    pub fn system_health(&mut self) -> SystemHealth {
        self.diagnostics.drain();
        let compliance = self.validator.compliance_summary();
        let reversibility = self.reversibility.reversibility_status();
        SystemHealth::assess(
            &self.config.health,
            compliance.compliance_rate,
            reversibility.rollback_success_rate,
            compliance.active_constraints,
            compliance.critical_violations.len(),
        )
    }

    /// Roll back every unit created within the emergency window.
    pub async fn emergency_shutdown(&mut self) -> BatchRollbackReport {
        let window = TimeDelta::from_std(self.config.health.emergency_window())
            .unwrap_or(TimeDelta::MAX);
        let since = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        tracing::warn!(since = %since, "Emergency shutdown requested");

        let report = self.reversibility.rollback_since(since).await;
        self.diagnostics.drain();
        tracing::warn!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Emergency shutdown finished"
        );
        report
    }

    /// Rollback failures observed so far, oldest first.
    ///
    /// Includes failures triggered directly through the coordinator.
    pub fn diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain();
        self.diagnostics.entries().cloned().collect()
    }

    #[must_use]
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    #[must_use]
    pub fn validator(&self) -> &ConstraintValidator {
        &self.validator
    }

    pub fn validator_mut(&mut self) -> &mut ConstraintValidator {
        self.diagnostics.drain();
        &mut self.validator
    }

    #[must_use]
    pub fn protection(&self) -> &ProtectionChain {
        &self.protection
    }

    pub fn protection_mut(&mut self) -> &mut ProtectionChain {
        self.diagnostics.drain();
        &mut self.protection
    }

    #[must_use]
    pub fn reversibility(&self) -> &ReversibilityCoordinator {
        &self.reversibility
    }

    pub fn reversibility_mut(&mut self) -> &mut ReversibilityCoordinator {
        self.diagnostics.drain();
        &mut self.reversibility
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(WardenConfig::default())
    }
}
