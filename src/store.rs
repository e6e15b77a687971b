//! Session store: one `AuthState` snapshot plus an observer registry.
//!
//! DESIGN
//! ======
//! Subscribers are notified synchronously, in registration order, with the
//! state that was just applied. The registry lock is never held across a
//! callback, so callbacks are free to call `get_state` or `set_state`.
//!
//! RE-ENTRANCY
//! ===========
//! A `set_state` issued from inside a subscriber callback is queued and
//! drained after the current pass finishes. There is at most one active
//! notification pass at a time; queued states are delivered FIFO, each to
//! every subscriber exactly once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::state::AuthState;

type SubscriberFn = dyn Fn(&AuthState) + Send + Sync;

struct StoreInner {
    state: AuthState,
    subscribers: Vec<(u64, Arc<SubscriberFn>)>,
    next_id: u64,
    /// True while a notification pass is dispatching callbacks.
    notifying: bool,
    /// States applied re-entrantly during a pass, delivered FIFO afterwards.
    queued: VecDeque<AuthState>,
}

/// Handle returned by [`SessionStore::subscribe`]; `cancel` removes the
/// callback. Dropping the handle without cancelling leaves the subscription
/// active for the life of the store.
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<StoreInner>>,
}

impl Subscription {
    pub fn cancel(self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Single source of truth for the current [`AuthState`].
///
/// Clone is cheap and shares the underlying snapshot and registry; exactly
/// one logical store exists per application.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl SessionStore {
    /// New store in the `Initializing` phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: AuthState::initializing(),
                subscribers: Vec::new(),
                next_id: 0,
                notifying: false,
                queued: VecDeque::new(),
            })),
        }
    }

    /// Snapshot of the current state. Never blocks on a notification pass.
    #[must_use]
    pub fn get_state(&self) -> AuthState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
            .clone()
    }

    /// Replace the state and notify every subscriber with the new snapshot.
    ///
    /// Called from inside a subscriber callback, the new state is queued and
    /// delivered once the in-progress pass completes.
    pub fn set_state(&self, next: AuthState) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.notifying {
            inner.queued.push_back(next);
            return;
        }
        inner.notifying = true;
        inner.state = next.clone();
        let mut current = next;
        loop {
            let subscribers: Vec<Arc<SubscriberFn>> =
                inner.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect();
            drop(inner);
            for callback in &subscribers {
                callback(&current);
            }
            inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            match inner.queued.pop_front() {
                Some(queued) => {
                    inner.state = queued.clone();
                    current = queued;
                }
                None => {
                    inner.notifying = false;
                    break;
                }
            }
        }
    }

    /// Register a callback invoked with every new state.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AuthState) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        Subscription { id, inner: Arc::downgrade(&self.inner) }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
