//! Subscriber bookkeeping for the reactive system.
//!
//! Every signal owns one [`SubscriberSet`]. The set holds strong references to
//! the effects that read the signal during their latest run, which is what
//! keeps a live effect alive after its handle is dropped. Effects keep only
//! weak back-references to the sets they joined so they can leave them again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::effect::EffectInner;

/// Unique identifier for a subscriber.
///
/// Each effect gets a unique ID when created. The ID keys the effect inside
/// every subscriber set it joins, which keeps subscriptions free of
/// duplicates when a run reads the same signal twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        thread_local! {
            static COUNTER: Cell<u64> = const { Cell::new(0) };
        }
        COUNTER.with(|counter| {
            let id = counter.get();
            counter.set(id + 1);
            Self(id)
        })
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The set of effects subscribed to one signal.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    subscribers: RefCell<IndexMap<SubscriberId, Rc<EffectInner>>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Insert a subscriber. Returns `false` if it was already present.
    pub(crate) fn insert(&self, effect: &Rc<EffectInner>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&effect.id()) {
            return false;
        }
        subscribers.insert(effect.id(), Rc::clone(effect));
        true
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().swap_remove(&id);
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Copy of the current subscribers.
    ///
    /// Notification iterates this copy, so runs that subscribe, unsubscribe
    /// or stop effects cannot disturb the pass in progress.
    pub(crate) fn snapshot(&self) -> SmallVec<[Rc<EffectInner>; 4]> {
        self.subscribers.borrow().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn subscriber_ids_increase() {
        let first = SubscriberId::new();
        let second = SubscriberId::new();
        assert!(second.raw() > first.raw());
    }
}
