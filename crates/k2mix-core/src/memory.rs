//! In-memory control engine
//!
//! Keeps control values in a map and models the two behaviours of the real
//! engine the core relies on: subscription replay and one-shot suppression of
//! manual writes. Used by the test suites and for dry runs without a host.

use crate::control::{ControlEngine, ControlHandler, ControlKey, Group, SubscriptionToken};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

struct Subscription {
    token: SubscriptionToken,
    group: Group,
    key: ControlKey,
    handler: ControlHandler,
}

/// Map-backed [`ControlEngine`]
///
/// Unset controls read as `0.0`.
#[derive(Default)]
pub struct MemoryEngine {
    values: RefCell<HashMap<(Group, ControlKey), f64>>,
    subscriptions: RefCell<Vec<Subscription>>,
    next_token: Cell<u64>,
    suppressed: RefCell<HashSet<(Group, ControlKey)>>,
    soft_takeover: RefCell<HashSet<(Group, ControlKey)>>,
    writes: RefCell<Vec<(Group, ControlKey, f64)>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a physical control moving
    ///
    /// Returns false when the write was swallowed by a pending suppression.
    pub fn external_write(&self, group: Group, key: ControlKey, value: f64) -> bool {
        let pending = self.suppressed.borrow_mut().remove(&(group, key));
        if pending && self.get_value(group, key) != value {
            log::trace!("MemoryEngine: suppressed manual write {}/{} = {}", group, key, value);
            return false;
        }
        self.store(group, key, value);
        true
    }

    /// Whether a one-shot suppression is still pending on this control
    pub fn is_suppressed(&self, group: Group, key: ControlKey) -> bool {
        self.suppressed.borrow().contains(&(group, key))
    }

    /// Whether soft takeover is currently enabled on this control
    pub fn soft_takeover_enabled(&self, group: Group, key: ControlKey) -> bool {
        self.soft_takeover.borrow().contains(&(group, key))
    }

    /// All programmatic writes since the last call, oldest first
    pub fn take_writes(&self) -> Vec<(Group, ControlKey, f64)> {
        std::mem::take(&mut *self.writes.borrow_mut())
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    fn store(&self, group: Group, key: ControlKey, value: f64) {
        let changed = self.values.borrow_mut().insert((group, key), value) != Some(value);
        if changed {
            self.notify(group, key, value);
        }
    }

    fn notify(&self, group: Group, key: ControlKey, value: f64) {
        // Handlers run with the list detached so a handler may subscribe
        let mut subs = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for sub in subs.iter_mut().filter(|s| s.group == group && s.key == key) {
            (sub.handler)(value);
        }
        let mut current = self.subscriptions.borrow_mut();
        subs.append(&mut current);
        *current = subs;
    }
}

impl ControlEngine for MemoryEngine {
    fn get_value(&self, group: Group, key: ControlKey) -> f64 {
        self.values.borrow().get(&(group, key)).copied().unwrap_or(0.0)
    }

    fn set_value(&self, group: Group, key: ControlKey, value: f64) {
        self.writes.borrow_mut().push((group, key, value));
        self.store(group, key, value);
    }

    fn subscribe(
        &self,
        group: Group,
        key: ControlKey,
        mut handler: ControlHandler,
    ) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.get());
        self.next_token.set(token.0 + 1);
        handler(self.get_value(group, key));
        self.subscriptions.borrow_mut().push(Subscription {
            token,
            group,
            key,
            handler,
        });
        token
    }

    fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscriptions.borrow_mut().retain(|s| s.token != token);
    }

    fn suppress_next_external_write(&self, group: Group, key: ControlKey) {
        self.suppressed.borrow_mut().insert((group, key));
    }

    fn set_soft_takeover(&self, group: Group, key: ControlKey, enabled: bool) {
        let mut soft = self.soft_takeover.borrow_mut();
        if enabled {
            soft.insert((group, key));
        } else {
            soft.remove(&(group, key));
        }
    }
}
