//! Observer protection for Warden.
//!
//! The [`ProtectionChain`] tracks registered observers and their rights, and
//! runs every action label through a priority-ordered chain of
//! [`ProtectionLayer`]s before it may touch an observer.

mod chain;
mod layer;

pub use chain::{
    DEREGISTER_LABEL, ProtectionChain, ProtectionResult, ProtectionSummary, ViolationFilter,
};
pub use layer::{DEFAULT_LAYERS, KeywordLayer, LayerFut, LayerVerdict, ProtectionLayer, default_layers};
