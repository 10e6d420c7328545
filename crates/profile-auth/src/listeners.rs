//! Auth state subscriber registry
//!
//! Subscribers are notified in registration order. Notification works on a
//! snapshot of the list, so a callback may unsubscribe itself (or anyone
//! else) while a notification is being delivered. A panicking callback is
//! caught and logged; the remaining subscribers still receive the event.

use crate::types::AuthUser;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Callback invoked with the current principal (`None` when signed out)
pub type AuthStateCallback = Arc<dyn Fn(Option<&AuthUser>) + Send + Sync>;

type Entries = Mutex<Vec<(u64, AuthStateCallback)>>;

/// Ordered collection of auth state subscribers
pub struct ListenerRegistry {
    entries: Arc<Entries>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback without invoking it
    pub fn add(&self, callback: AuthStateCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, callback));
        debug!("Registered auth state listener {}", id);

        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
            active: AtomicBool::new(true),
        }
    }

    /// Register a callback and immediately deliver `current` to it
    pub fn subscribe(&self, callback: AuthStateCallback, current: Option<&AuthUser>) -> Subscription {
        let subscription = self.add(callback.clone());
        invoke(&callback, current);
        subscription
    }

    /// Deliver `user` to every registered callback
    pub fn notify(&self, user: Option<&AuthUser>) {
        let snapshot: Vec<AuthStateCallback> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        debug!("Notifying {} auth state listener(s)", snapshot.len());
        for callback in &snapshot {
            invoke(callback, user);
        }
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke(callback: &AuthStateCallback, user: Option<&AuthUser>) {
    if catch_unwind(AssertUnwindSafe(|| callback(user))).is_err() {
        error!("Auth state listener panicked; continuing with remaining listeners");
    }
}

/// Handle returned by `on_auth_state_changed`
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it. Unsubscribing more than once
/// is a no-op.
pub struct Subscription {
    id: u64,
    entries: Weak<Entries>,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(entries) = self.entries.upgrade() {
            entries.lock().retain(|(id, _)| *id != self.id);
            debug!("Removed auth state listener {}", self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
