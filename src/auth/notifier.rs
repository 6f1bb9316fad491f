//! Auth state change fan-out.
//!
//! The auth service pushes [`AuthChange`] notifications through an
//! [`AuthStateNotifier`]. Every call to [`AuthStateNotifier::subscribe`]
//! returns an [`AuthSubscription`] that owns its registration: the listener
//! stays registered exactly as long as the handle is alive. Calling
//! [`AuthSubscription::unsubscribe`] consumes the handle, so it can only be
//! called once; dropping the handle without calling it releases the
//! registration the same way.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use super::types::AuthChange;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<AuthChange>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct AuthStateNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl AuthStateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.insert(id, tx);
        tracing::debug!(subscription = id, "auth state listener registered");

        AuthSubscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `change` to every live listener, returning how many received it.
    pub fn emit(&self, change: AuthChange) -> usize {
        let mut registry = lock(&self.registry);
        registry.listeners.retain(|_, tx| tx.send(change.clone()).is_ok());
        tracing::debug!(event = %change.event, listeners = registry.listeners.len(), "auth state change emitted");
        registry.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Registration handle returned by [`AuthStateNotifier::subscribe`]
pub struct AuthSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<AuthChange>,
    registry: Weak<Mutex<Registry>>,
}

impl AuthSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next notification, or `None` once the notifier is gone.
    pub async fn recv(&mut self) -> Option<AuthChange> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<AuthChange> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.remove(&self.id);
            tracing::debug!(subscription = self.id, "auth state listener released");
        }
    }
}
