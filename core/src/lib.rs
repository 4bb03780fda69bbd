//! Shared runtime plumbing for Warden.
//!
//! This crate holds the pieces every component needs but none owns:
//! the per-instance notification registry, keyword matching, and small
//! formatting helpers.

mod keywords;
mod notifier;
mod util;

pub use keywords::{KeywordError, KeywordSet};
pub use notifier::{NotificationFilter, Notifier};
pub use util::{panic_payload_to_string, percentage_or_full};
