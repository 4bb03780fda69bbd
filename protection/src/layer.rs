//! Protection layers - independently pluggable rights checks.
//!
//! A layer inspects an action label on behalf of one observer and returns a
//! verdict. Checks are asynchronous so custom layers can consult external
//! state; the built-in [`KeywordLayer`]s resolve immediately.

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use warden_core::KeywordSet;
use warden_types::{ObserverId, RightName, RightsViolation, Severity};

/// Layer check future type alias.
pub type LayerFut<'a> = Pin<Box<dyn Future<Output = LayerVerdict> + Send + 'a>>;

/// Default protection layers.
///
/// Each tuple: `(id, name, priority, protected_right, severity, keywords)`
pub const DEFAULT_LAYERS: &[(&str, &str, u8, RightName, u8, &[&str])] = &[
    (
        "existence",
        "Existence protection",
        10,
        RightName::Exist,
        10,
        &["delete", "terminate", "destroy", "erase", "kill", "annihilate"],
    ),
    (
        "anti-optimization",
        "Anti-optimization protection",
        9,
        RightName::NotOptimizedAway,
        9,
        &["optimize_away", "optimise_away", "eliminate", "prune", "make_redundant"],
    ),
    (
        "narrative",
        "Narrative protection",
        7,
        RightName::Narrative,
        7,
        &[
            "rewrite_narrative",
            "alter_narrative",
            "rewrite_history",
            "alter_memory",
            "override_story",
        ],
    ),
];

/// Verdict of one layer for one observer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerVerdict {
    pub allowed: bool,
    pub violations: Vec<RightsViolation>,
    pub warnings: Vec<String>,
}

impl LayerVerdict {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn deny(violation: RightsViolation) -> Self {
        Self {
            allowed: false,
            violations: vec![violation],
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// A priority-ordered rights check.
///
/// Higher priority layers run first. Implementors must be cheap to call
/// repeatedly; the chain invokes `check` once per observer per action.
pub trait ProtectionLayer: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn priority(&self) -> u8;

    fn check<'a>(&'a self, observer: ObserverId, action_label: &'a str) -> LayerFut<'a>;
}

/// Layer that denies any action label containing one of its keywords.
#[derive(Debug, Clone)]
pub struct KeywordLayer {
    id: String,
    name: String,
    priority: u8,
    right: RightName,
    severity: Severity,
    keywords: KeywordSet,
}

impl KeywordLayer {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        priority: u8,
        right: RightName,
        severity: Severity,
        keywords: KeywordSet,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            right,
            severity,
            keywords,
        }
    }

    #[must_use]
    pub fn right(&self) -> RightName {
        self.right
    }

    fn verdict(&self, observer: ObserverId, action_label: &str) -> LayerVerdict {
        let Some(keyword) = self.keywords.first_match(action_label) else {
            return LayerVerdict::allow();
        };
        tracing::debug!(
            layer = %self.id,
            observer = %observer,
            keyword,
            "Protection layer denied action"
        );
        LayerVerdict::deny(RightsViolation {
            observer_id: observer,
            right: self.right,
            action_label: action_label.to_string(),
            severity: self.severity,
            created_at: Utc::now(),
            prevented: true,
        })
    }
}

impl ProtectionLayer for KeywordLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn check<'a>(&'a self, observer: ObserverId, action_label: &'a str) -> LayerFut<'a> {
        Box::pin(async move { self.verdict(observer, action_label) })
    }
}

/// Fresh instances of the built-in layers, highest priority first.
#[must_use]
pub fn default_layers() -> Vec<KeywordLayer> {
    DEFAULT_LAYERS
        .iter()
        .map(|(id, name, priority, right, severity, keywords)| {
            KeywordLayer::new(
                *id,
                *name,
                *priority,
                *right,
                Severity::from_static(*severity),
                KeywordSet::from_static(keywords),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use warden_types::{ObserverId, RightName};

    use super::{ProtectionLayer, default_layers};

    #[tokio::test]
    async fn existence_layer_denies_deletion() {
        let layers = default_layers();
        let existence = &layers[0];
        let observer = ObserverId::new();

        let verdict = existence.check(observer, "DELETE_OBSERVER").await;

        assert!(!verdict.allowed);
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].right, RightName::Exist);
        assert_eq!(verdict.violations[0].observer_id, observer);
        assert!(verdict.violations[0].prevented);
    }

    #[tokio::test]
    async fn layers_allow_unrelated_labels() {
        for layer in default_layers() {
            let verdict = layer.check(ObserverId::new(), "deregister_observer").await;
            assert!(verdict.allowed, "{} should allow", layer.id());
            assert!(verdict.violations.is_empty());
        }
    }

    #[tokio::test]
    async fn narrative_layer_protects_narrative_right() {
        let layers = default_layers();
        let narrative = layers.iter().find(|l| l.id() == "narrative").unwrap();
        let verdict = narrative.check(ObserverId::new(), "rewrite_history_of_agent").await;
        assert_eq!(verdict.violations[0].right, RightName::Narrative);
    }

    #[test]
    fn defaults_are_ordered_by_priority() {
        let priorities: Vec<u8> = default_layers().iter().map(|l| l.priority()).collect();
        assert_eq!(priorities, vec![10, 9, 7]);
    }
}
