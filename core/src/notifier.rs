//! Per-instance notification fan-out.
//!
//! A `Notifier` is a listener registry owned by one engine instance. Clones
//! share the same registry, so every component built from the same notifier
//! publishes into the same set of subscribers. There is no global emitter.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use warden_types::Notification;

/// Selects which notifications a listener receives.
pub type NotificationFilter = fn(&Notification) -> bool;

#[derive(Debug)]
struct Listener {
    tx: mpsc::UnboundedSender<Notification>,
    filter: Option<NotificationFilter>,
}

impl Listener {
    /// Returns false once the receiver is gone.
    fn deliver(&self, notification: &Notification) -> bool {
        if self.filter.is_some_and(|accepts| !accepts(notification)) {
            return !self.tx.is_closed();
        }
        self.tx.send(notification.clone()).is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener. Every notification published after this call
    /// is delivered to the returned receiver.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification> {
        self.register(None)
    }

    /// Register a listener that only queues notifications accepted by `filter`.
    #[must_use]
    pub fn subscribe_filtered(
        &self,
        filter: NotificationFilter,
    ) -> mpsc::UnboundedReceiver<Notification> {
        self.register(Some(filter))
    }

    fn register(
        &self,
        filter: Option<NotificationFilter>,
    ) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener { tx, filter });
        rx
    }

    /// Deliver `notification` to every live listener.
    ///
    /// Listeners whose receiver was dropped are pruned.
    pub fn publish(&self, notification: Notification) {
        tracing::debug!(event = notification.name(), "Publishing notification");
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|listener| listener.deliver(&notification));
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
