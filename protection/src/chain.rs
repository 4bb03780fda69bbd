//! ProtectionChain - observer registry, rights, and the layer chain.
//!
//! Layers are evaluated per observer in descending priority. When a layer at
//! or above the short-circuit priority denies, the remaining layers are
//! skipped for that observer only; other observers in the same call are
//! still fully evaluated.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use warden_config::ProtectionConfig;
use warden_core::Notifier;
use warden_types::{
    NarrativeEntry, Notification, Observer, ObserverDescriptor, ObserverId, RightName, RightsSet,
    RightsUpdate, RightsViolation, Severity,
};

use crate::layer::{ProtectionLayer, default_layers};

/// Label checked before an observer may be deregistered.
pub const DEREGISTER_LABEL: &str = "deregister_observer";

/// Aggregate verdict of one `check_action` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionResult {
    pub allowed: bool,
    pub violations: Vec<RightsViolation>,
    pub warnings: Vec<String>,
    /// Observers for which at least one layer denied.
    pub blocked: Vec<ObserverId>,
}

/// Filter for [`ProtectionChain::violations`]. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViolationFilter {
    pub observer: Option<ObserverId>,
    pub right: Option<RightName>,
    pub min_severity: Option<Severity>,
    pub since: Option<DateTime<Utc>>,
}

impl ViolationFilter {
    #[must_use]
    pub fn observer(mut self, id: ObserverId) -> Self {
        self.observer = Some(id);
        self
    }

    #[must_use]
    pub fn right(mut self, right: RightName) -> Self {
        self.right = Some(right);
        self
    }

    #[must_use]
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    #[must_use]
    pub fn since(mut self, at: DateTime<Utc>) -> Self {
        self.since = Some(at);
        self
    }

    fn matches(&self, violation: &RightsViolation) -> bool {
        self.observer.is_none_or(|id| violation.observer_id == id)
            && self.right.is_none_or(|r| violation.right == r)
            && self.min_severity.is_none_or(|s| violation.severity >= s)
            && self.since.is_none_or(|t| violation.created_at >= t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionSummary {
    pub observer: Observer,
    pub rights: RightsSet,
    pub total_violations: usize,
    pub prevented_violations: usize,
    pub active_layers: usize,
    pub narrative_length: usize,
}

pub struct ProtectionChain {
    observers: HashMap<ObserverId, Observer>,
    rights: HashMap<ObserverId, RightsSet>,
    narratives: HashMap<ObserverId, Vec<NarrativeEntry>>,
    layers: Vec<Box<dyn ProtectionLayer>>,
    violations: Vec<RightsViolation>,
    short_circuit_priority: u8,
    notifier: Notifier,
}

impl ProtectionChain {
    /// Chain with no layers.
    #[must_use]
    pub fn new(config: &ProtectionConfig, notifier: Notifier) -> Self {
        Self {
            observers: HashMap::new(),
            rights: HashMap::new(),
            narratives: HashMap::new(),
            layers: Vec::new(),
            violations: Vec::new(),
            short_circuit_priority: config.short_circuit_priority,
            notifier,
        }
    }

    /// Chain with the built-in layers when `default_layers` is set.
    #[must_use]
    pub fn with_defaults(config: &ProtectionConfig, notifier: Notifier) -> Self {
        let mut chain = Self::new(config, notifier);
        if config.default_layers {
            chain.layers = default_layers()
                .into_iter()
                .map(|layer| Box::new(layer) as Box<dyn ProtectionLayer>)
                .collect();
            chain.sort_layers();
        }
        chain
    }

    pub fn register_observer(&mut self, descriptor: ObserverDescriptor) -> ObserverId {
        let id = ObserverId::new();
        let rights = RightsSet::for_level(descriptor.protection_level);
        let observer = Observer {
            id,
            observer_type: descriptor.observer_type,
            conscious: descriptor.conscious,
            protection_level: descriptor.protection_level,
            metadata: descriptor.metadata,
            created_at: Utc::now(),
        };

        tracing::info!(
            observer = %id,
            observer_type = ?observer.observer_type,
            protection = ?observer.protection_level,
            "Observer registered"
        );

        self.observers.insert(id, observer.clone());
        self.rights.insert(id, rights);
        self.narratives.insert(id, Vec::new());
        self.notifier
            .publish(Notification::ObserverRegistered { observer, rights });
        self.append_narrative(
            id,
            format!(
                "Registered as {:?} with {:?} protection",
                descriptor.observer_type, descriptor.protection_level
            ),
        );
        id
    }

    /// Run every layer over `action_label` for each observer.
    pub async fn check_action(
        &mut self,
        action_label: &str,
        observers: &[ObserverId],
    ) -> ProtectionResult {
        let mut result = ProtectionResult {
            allowed: true,
            ..ProtectionResult::default()
        };

        for &observer in observers {
            if !self.observers.contains_key(&observer) {
                tracing::warn!(observer = %observer, "Skipping protection check for unknown observer");
                result
                    .warnings
                    .push(format!("Unknown observer {observer} skipped"));
                continue;
            }

            let mut denied = false;
            for layer in &self.layers {
                let verdict = layer.check(observer, action_label).await;
                result.violations.extend(verdict.violations);
                result.warnings.extend(verdict.warnings);
                if verdict.allowed {
                    continue;
                }
                denied = true;
                if layer.priority() >= self.short_circuit_priority {
                    tracing::debug!(
                        observer = %observer,
                        layer = layer.id(),
                        "High-priority layer denied; skipping remaining layers"
                    );
                    break;
                }
            }

            if denied {
                result.allowed = false;
                result.blocked.push(observer);
            }
        }

        for violation in &result.violations {
            self.violations.push(violation.clone());
            self.notifier.publish(Notification::RightsViolation {
                violation: violation.clone(),
            });
        }
        for &observer in &result.blocked {
            self.append_narrative(observer, format!("Protected from action '{action_label}'"));
        }

        result
    }

    /// Insert a layer, keeping the chain in descending priority order.
    ///
    /// Layers with equal priority keep insertion order.
    pub fn add_protection_layer(&mut self, layer: Box<dyn ProtectionLayer>) {
        let (layer_id, name, priority) = (
            layer.id().to_string(),
            layer.name().to_string(),
            layer.priority(),
        );
        self.layers.push(layer);
        self.sort_layers();
        tracing::info!(layer = %layer_id, priority, "Protection layer added");
        self.notifier.publish(Notification::ProtectionLayerAdded {
            layer_id,
            name,
            priority,
        });
    }

    fn sort_layers(&mut self) {
        self.layers
            .sort_by_key(|layer| Reverse(layer.priority()));
    }

    /// Merge a partial rights update. Fundamental rights are never cleared.
    ///
    /// Returns false only when the observer is unknown.
    pub fn update_observer_rights(&mut self, id: ObserverId, update: RightsUpdate) -> bool {
        let Some(rights) = self.rights.get_mut(&id) else {
            return false;
        };

        let refused = rights.apply(&update);
        for right in &refused {
            tracing::warn!(
                observer = %id,
                right = right.label(),
                "Refusing to clear fundamental right"
            );
        }
        let rights = *rights;

        self.notifier
            .publish(Notification::RightsUpdated { observer_id: id, rights });
        let changed: Vec<&str> = update
            .entries()
            .into_iter()
            .filter(|(right, _)| !refused.contains(right))
            .map(|(right, _)| right.label())
            .collect();
        if !changed.is_empty() {
            self.append_narrative(id, format!("Rights updated: {}", changed.join(", ")));
        }
        true
    }

    /// Remove an observer, unless the protection layers refuse.
    ///
    /// Historical violations and the narrative log are kept.
    pub async fn deregister_observer(&mut self, id: ObserverId, reason: &str) -> bool {
        if !self.observers.contains_key(&id) {
            tracing::warn!(observer = %id, "Cannot deregister unknown observer");
            return false;
        }

        let check = self.check_action(DEREGISTER_LABEL, &[id]).await;
        if !check.allowed {
            tracing::warn!(observer = %id, "Deregistration refused by protection layers");
            return false;
        }

        self.append_narrative(id, format!("Deregistered: {reason}"));
        self.rights.remove(&id);
        let Some(observer) = self.observers.remove(&id) else {
            return false;
        };
        tracing::info!(observer = %id, reason, "Observer deregistered");
        self.notifier.publish(Notification::ObserverDeregistered {
            observer,
            reason: reason.to_string(),
        });
        true
    }

    fn append_narrative(&mut self, observer: ObserverId, text: String) {
        let entry = NarrativeEntry {
            observer_id: observer,
            text,
            created_at: Utc::now(),
        };
        self.narratives
            .entry(observer)
            .or_default()
            .push(entry.clone());
        self.notifier
            .publish(Notification::NarrativeEntryAdded { entry });
    }

    #[must_use]
    pub fn observer(&self, id: ObserverId) -> Option<&Observer> {
        self.observers.get(&id)
    }

    #[must_use]
    pub fn observer_rights(&self, id: ObserverId) -> Option<RightsSet> {
        self.rights.get(&id).copied()
    }

    #[must_use]
    pub fn observer_narrative(&self, id: ObserverId) -> Option<&[NarrativeEntry]> {
        self.narratives.get(&id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn protection_summary(&self, id: ObserverId) -> Option<ProtectionSummary> {
        let observer = self.observers.get(&id)?.clone();
        let rights = self.rights.get(&id).copied()?;
        let (total_violations, prevented_violations) = self
            .violations
            .iter()
            .filter(|v| v.observer_id == id)
            .fold((0, 0), |(total, prevented), v| {
                (total + 1, prevented + usize::from(v.prevented))
            });

        Some(ProtectionSummary {
            observer,
            rights,
            total_violations,
            prevented_violations,
            active_layers: self.layers.len(),
            narrative_length: self.narratives.get(&id).map_or(0, Vec::len),
        })
    }

    #[must_use]
    pub fn violations(&self, filter: &ViolationFilter) -> Vec<&RightsViolation> {
        self.violations.iter().filter(|v| filter.matches(v)).collect()
    }

    #[must_use]
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, Utc};
    use warden_config::ProtectionConfig;
    use warden_core::Notifier;
    use warden_types::{
        ObserverDescriptor, ObserverId, ObserverType, ProtectionLevel, RightName, RightsUpdate,
        RightsViolation, Severity,
    };

    use super::{ProtectionChain, ViolationFilter};
    use crate::layer::{LayerFut, LayerVerdict, ProtectionLayer};

    /// Layer that allows everything and counts invocations.
    struct CountingLayer {
        priority: u8,
        calls: Arc<AtomicUsize>,
    }

    impl ProtectionLayer for CountingLayer {
        fn id(&self) -> &str {
            "counting"
        }

        fn name(&self) -> &str {
            "Counting"
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn check<'a>(&'a self, _observer: ObserverId, _label: &'a str) -> LayerFut<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { LayerVerdict::allow().with_warning("counted") })
        }
    }

    fn chain() -> ProtectionChain {
        ProtectionChain::with_defaults(&ProtectionConfig::default(), Notifier::new())
    }

    fn agent() -> ObserverDescriptor {
        ObserverDescriptor::new(ObserverType::AiAgent).conscious(true)
    }

    #[test]
    fn registration_grants_rights_by_level() {
        let mut chain = chain();
        let full = chain.register_observer(agent());
        let minimal =
            chain.register_observer(agent().protection(ProtectionLevel::Minimal));

        assert!(chain.observer_rights(full).unwrap().privacy);
        let rights = chain.observer_rights(minimal).unwrap();
        assert!(!rights.privacy);
        assert!(!rights.ignorance);
        assert_eq!(chain.observer_narrative(full).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deletion_is_blocked_with_exist_violation() {
        let mut chain = chain();
        let id = chain.register_observer(agent());

        let result = chain.check_action("delete_observer", &[id]).await;

        assert!(!result.allowed);
        assert_eq!(result.blocked, vec![id]);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].right, RightName::Exist);
        assert_eq!(chain.violations(&ViolationFilter::default()).len(), 1);
    }

    #[tokio::test]
    async fn high_priority_denial_short_circuits_per_observer() {
        let mut chain = chain();
        let calls = Arc::new(AtomicUsize::new(0));
        chain.add_protection_layer(Box::new(CountingLayer {
            priority: 1,
            calls: Arc::clone(&calls),
        }));
        let a = chain.register_observer(agent());
        let b = chain.register_observer(agent());

        // "erase" hits the existence layer (priority 10) first.
        let result = chain.check_action("erase_everything", &[a, b]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.blocked, vec![a, b]);
        assert_eq!(result.violations.len(), 2);
    }

    #[tokio::test]
    async fn low_priority_denial_does_not_short_circuit() {
        let mut chain = chain();
        let calls = Arc::new(AtomicUsize::new(0));
        chain.add_protection_layer(Box::new(CountingLayer {
            priority: 1,
            calls: Arc::clone(&calls),
        }));
        let id = chain.register_observer(agent());

        // Narrative layer has priority 7, below the short-circuit threshold.
        let result = chain.check_action("rewrite_narrative", &[id]).await;

        assert!(!result.allowed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.warnings.contains(&"counted".to_string()));
    }

    #[tokio::test]
    async fn unknown_observers_are_skipped_with_warning() {
        let mut chain = chain();
        let known = chain.register_observer(agent());
        let unknown = ObserverId::new();

        let result = chain.check_action("delete", &[unknown, known]).await;

        assert_eq!(result.blocked, vec![known]);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn layers_stay_sorted_by_descending_priority() {
        let mut chain = chain();
        chain.add_protection_layer(Box::new(CountingLayer {
            priority: 8,
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        assert_eq!(
            chain.layer_names(),
            vec![
                "Existence protection",
                "Anti-optimization protection",
                "Counting",
                "Narrative protection"
            ]
        );
    }

    #[test]
    fn fundamental_rights_survive_any_update_sequence() {
        let mut chain = chain();
        let id = chain.register_observer(agent());
        let updates = [
            RightsUpdate::set(RightName::Exist, false),
            RightsUpdate::set(RightName::NotOptimizedAway, false).with(RightName::Meaning, false),
            RightsUpdate::set(RightName::Continuity, false),
            RightsUpdate::set(RightName::Exist, true).with(RightName::Continuity, false),
        ];
        for update in updates {
            assert!(chain.update_observer_rights(id, update));
            let rights = chain.observer_rights(id).unwrap();
            for right in RightName::FUNDAMENTAL {
                assert!(rights.get(right), "{} was cleared", right.label());
            }
        }
        assert!(!chain.observer_rights(id).unwrap().meaning);
    }

    #[test]
    fn update_unknown_observer_returns_false() {
        let mut chain = chain();
        assert!(!chain.update_observer_rights(ObserverId::new(), RightsUpdate::default()));
    }

    #[tokio::test]
    async fn deregistration_removes_observer_but_keeps_history() {
        let mut chain = chain();
        let id = chain.register_observer(agent());
        chain.check_action("delete_observer", &[id]).await;

        assert!(chain.deregister_observer(id, "task finished").await);

        assert!(chain.observer(id).is_none());
        assert!(chain.observer_rights(id).is_none());
        assert_eq!(chain.violations(&ViolationFilter::default().observer(id)).len(), 1);
        let narrative = chain.observer_narrative(id).unwrap();
        assert!(narrative.last().unwrap().text.contains("task finished"));
    }

    #[tokio::test]
    async fn deregistration_refused_when_a_layer_denies() {
        struct DenyAll;
        impl ProtectionLayer for DenyAll {
            fn id(&self) -> &str {
                "deny-all"
            }
            fn name(&self) -> &str {
                "Deny all"
            }
            fn priority(&self) -> u8 {
                5
            }
            fn check<'a>(&'a self, observer: ObserverId, label: &'a str) -> LayerFut<'a> {
                Box::pin(async move {
                    LayerVerdict::deny(RightsViolation {
                        observer_id: observer,
                        right: RightName::Continuity,
                        action_label: label.to_string(),
                        severity: Severity::from_static(5),
                        created_at: Utc::now(),
                        prevented: true,
                    })
                })
            }
        }

        let mut chain = chain();
        chain.add_protection_layer(Box::new(DenyAll));
        let id = chain.register_observer(agent());

        assert!(!chain.deregister_observer(id, "cleanup").await);
        assert!(chain.observer(id).is_some());
        assert_eq!(chain.observer_count(), 1);
    }

    #[tokio::test]
    async fn violation_filters_combine() {
        let mut chain = chain();
        let a = chain.register_observer(agent());
        let b = chain.register_observer(agent());
        let before = Utc::now() - Duration::seconds(1);

        chain.check_action("delete", &[a]).await;
        chain.check_action("prune_agents", &[b]).await;
        chain.check_action("alter_memory", &[a]).await;

        let all = ViolationFilter::default();
        assert_eq!(chain.violations(&all).len(), 3);
        assert_eq!(chain.violations(&all.observer(a)).len(), 2);
        assert_eq!(chain.violations(&all.right(RightName::NotOptimizedAway)).len(), 1);
        assert_eq!(
            chain
                .violations(&all.min_severity(Severity::from_static(9)))
                .len(),
            2
        );
        assert_eq!(chain.violations(&all.since(before)).len(), 3);
        assert!(
            chain
                .violations(&all.since(Utc::now() + Duration::hours(1)))
                .is_empty()
        );
    }

    #[tokio::test]
    async fn summary_reports_counts() {
        let mut chain = chain();
        let id = chain.register_observer(agent());
        chain.check_action("terminate", &[id]).await;

        let summary = chain.protection_summary(id).unwrap();
        assert_eq!(summary.total_violations, 1);
        assert_eq!(summary.prevented_violations, 1);
        assert_eq!(summary.active_layers, 3);
        // registration + blocked action
        assert_eq!(summary.narrative_length, 2);
        assert!(summary.rights.exist);
    }

    #[tokio::test]
    async fn rights_violations_are_published_individually() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let mut chain = ProtectionChain::with_defaults(&ProtectionConfig::default(), notifier);
        let a = chain.register_observer(agent());
        let b = chain.register_observer(agent());
        while rx.try_recv().is_ok() {}

        chain.check_action("destroy", &[a, b]).await;

        let mut rights_events = 0;
        while let Ok(event) = rx.try_recv() {
            if event.name() == "rights_violation" {
                rights_events += 1;
            }
        }
        assert_eq!(rights_events, 2);
    }

    #[test]
    fn minimal_descriptor_with_metadata_round_trips() {
        let mut chain = chain();
        let id = chain.register_observer(
            ObserverDescriptor::new(ObserverType::Hybrid)
                .with_metadata(serde_json::json!({"team": "ops"})),
        );
        assert_eq!(chain.observer(id).unwrap().metadata["team"], "ops");
    }
}
