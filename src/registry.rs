//! Per-state listener registry.
//!
//! Each state owns an insertion-ordered set of zero-argument callbacks,
//! deduplicated by callback identity: registering the same `Arc` twice
//! under one state is a no-op on the second call, while the same callback
//! under different states counts as independent entries.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::domain::IdleState;

/// A state-change callback.
///
/// Identity (the `Arc` allocation) is what the registry deduplicates on,
/// so hold on to the `Arc` if you intend to register it in more than one
/// place.
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Listener sets for both states.
#[derive(Default)]
pub(crate) struct Registry {
    active: Vec<Callback>,
    idle: Vec<Callback>,
    /// Set on teardown; a closed registry refuses new registrations.
    closed: bool,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn slot(&self, state: IdleState) -> &Vec<Callback> {
        match state {
            IdleState::Active => &self.active,
            IdleState::Idle => &self.idle,
        }
    }

    fn slot_mut(&mut self, state: IdleState) -> &mut Vec<Callback> {
        match state {
            IdleState::Active => &mut self.active,
            IdleState::Idle => &mut self.idle,
        }
    }

    /// Register a callback under a state, deduplicated by identity.
    pub(crate) fn add(&mut self, state: IdleState, callback: &Callback) {
        if self.closed {
            return;
        }
        let slot = self.slot_mut(state);
        if !slot.iter().any(|existing| Arc::ptr_eq(existing, callback)) {
            slot.push(Arc::clone(callback));
        }
    }

    /// Remove a callback from a state's set. No-op if absent.
    pub(crate) fn remove(&mut self, state: IdleState, callback: &Callback) {
        self.slot_mut(state)
            .retain(|existing| !Arc::ptr_eq(existing, callback));
    }

    /// Snapshot a state's callbacks in insertion order.
    ///
    /// Dispatch iterates the snapshot, so listeners registered or removed
    /// mid-dispatch take effect from the next transition.
    pub(crate) fn snapshot(&self, state: IdleState) -> Vec<Callback> {
        self.slot(state).clone()
    }

    /// Drop every listener and refuse registrations from now on.
    pub(crate) fn clear(&mut self) {
        self.active.clear();
        self.idle.clear();
        self.closed = true;
    }

    #[cfg(test)]
    fn len(&self, state: IdleState) -> usize {
        self.slot(state).len()
    }
}

/// Handle returned by [`IdleManager::on`](crate::IdleManager::on) that
/// removes exactly one callback from exactly one state's set.
///
/// Holds only weak references, so it never keeps a torn-down machine or
/// its listeners alive.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    state: IdleState,
    callback: Weak<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new(
        registry: &Arc<Mutex<Registry>>,
        state: IdleState,
        callback: &Callback,
    ) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            state,
            callback: Arc::downgrade(callback),
        }
    }

    /// Unsubscribe the callback from the state it was registered under.
    ///
    /// Safe to call any number of times; after the first call (or after
    /// the machine's teardown) it has no effect.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Some(callback) = self.callback.upgrade() else {
            return;
        };
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.state, &callback);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_callback() -> (Callback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (
            callback(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
            count,
        )
    }

    #[test]
    fn test_add_deduplicates_by_identity() {
        let mut registry = Registry::new();
        let (cb, _) = counting_callback();

        registry.add(IdleState::Idle, &cb);
        registry.add(IdleState::Idle, &cb);

        assert_eq!(registry.len(IdleState::Idle), 1);
    }

    #[test]
    fn test_same_callback_under_both_states_is_independent() {
        let mut registry = Registry::new();
        let (cb, _) = counting_callback();

        registry.add(IdleState::Idle, &cb);
        registry.add(IdleState::Active, &cb);

        assert_eq!(registry.len(IdleState::Idle), 1);
        assert_eq!(registry.len(IdleState::Active), 1);
    }

    #[test]
    fn test_remove_targets_one_entry() {
        let mut registry = Registry::new();
        let (first, _) = counting_callback();
        let (second, _) = counting_callback();

        registry.add(IdleState::Active, &first);
        registry.add(IdleState::Active, &second);
        registry.remove(IdleState::Active, &first);

        let remaining = registry.snapshot(IdleState::Active);
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &second));

        // Removing again is a no-op
        registry.remove(IdleState::Active, &first);
        assert_eq!(registry.len(IdleState::Active), 1);
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let mut registry = Registry::new();
        let (first, _) = counting_callback();
        let (second, _) = counting_callback();
        let (third, _) = counting_callback();

        registry.add(IdleState::Idle, &first);
        registry.add(IdleState::Idle, &second);
        registry.add(IdleState::Idle, &third);

        let snapshot = registry.snapshot(IdleState::Idle);
        assert!(Arc::ptr_eq(&snapshot[0], &first));
        assert!(Arc::ptr_eq(&snapshot[1], &second));
        assert!(Arc::ptr_eq(&snapshot[2], &third));
    }

    #[test]
    fn test_clear_empties_and_closes() {
        let mut registry = Registry::new();
        let (cb, _) = counting_callback();

        registry.add(IdleState::Idle, &cb);
        registry.clear();
        assert_eq!(registry.len(IdleState::Idle), 0);

        // Closed registry refuses new registrations
        registry.add(IdleState::Idle, &cb);
        assert_eq!(registry.len(IdleState::Idle), 0);

        // Clearing again is safe
        registry.clear();
    }

    #[test]
    fn test_subscription_unsubscribe_is_idempotent() {
        let registry = Arc::new(Mutex::new(Registry::new()));
        let (cb, _) = counting_callback();

        registry.lock().unwrap().add(IdleState::Idle, &cb);
        let subscription = Subscription::new(&registry, IdleState::Idle, &cb);

        subscription.unsubscribe();
        assert_eq!(registry.lock().unwrap().len(IdleState::Idle), 0);

        subscription.unsubscribe();
        assert_eq!(registry.lock().unwrap().len(IdleState::Idle), 0);
    }

    #[test]
    fn test_subscription_survives_registry_drop() {
        let registry = Arc::new(Mutex::new(Registry::new()));
        let (cb, _) = counting_callback();

        registry.lock().unwrap().add(IdleState::Idle, &cb);
        let subscription = Subscription::new(&registry, IdleState::Idle, &cb);

        drop(registry);
        subscription.unsubscribe();
    }
}
