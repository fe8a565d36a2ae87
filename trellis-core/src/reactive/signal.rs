//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the signal adds that
//!    effect to its subscriber set and the effect records the reverse edge.
//!
//! 2. When a signal is written with a value that differs from the current
//!    one, every subscriber that is still active re-runs synchronously.
//!
//! 3. Writing an equal value notifies nobody.
//!
//! Notification walks a snapshot of the subscriber set taken at write time.
//! Effects that subscribe during the pass wait for the next write; effects
//! stopped during the pass are skipped.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::context::ReactiveContext;
use super::subscriber::SubscriberSet;

/// A reactive cell holding a value of type `T`.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    value: RefCell<T>,
    subscribers: Rc<SubscriberSet>,
}

impl<T> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                value: RefCell::new(value),
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// Subscribe the current effect, if any.
    fn track(&self) {
        if let Some(effect) = ReactiveContext::current() {
            if effect.is_active() && self.inner.subscribers.insert(&effect) {
                effect.add_dependency(&self.inner.subscribers);
            }
        }
    }

    /// Re-run every active subscriber from a snapshot of the set.
    fn notify(&self) {
        for effect in self.inner.subscribers.snapshot() {
            if effect.is_active() {
                effect.run();
            }
        }
    }

    /// Borrow the current value, subscribing the current effect.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Borrow the current value without subscribing.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of effects currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Check whether the effect with `id` is subscribed.
    pub fn is_subscribed(&self, id: super::SubscriberId) -> bool {
        self.inner.subscribers.contains(id)
    }

    /// Check whether two handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone> Signal<T> {
    /// Get the current value.
    ///
    /// If called while an effect runs, the effect subscribes to this signal.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq> Signal<T> {
    /// Set a new value and notify subscribers if it differs from the old one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.notify();
        true
    }

    /// Replace the value using a function of the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }

    /// Mutate the value in place, then notify if it changed.
    pub fn modify(&self, f: impl FnOnce(&mut T))
    where
        T: Clone,
    {
        let mut next = self.get_untracked();
        f(&mut next);
        self.set(next);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a signal.
pub fn create_signal<T>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    fn counting_effect(signal: &Signal<i32>) -> (Effect, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let (reader, runs_clone) = (signal.clone(), Rc::clone(&runs));
        let effect = Effect::new(move || {
            reader.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        (effect, runs)
    }

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        assert!(signal.set(42));
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);

        signal.modify(|v| *v *= 2);
        assert_eq!(signal.get(), 30);
    }

    #[test]
    fn equal_write_notifies_nobody() {
        let signal = Signal::new(7);
        let (_effect, runs) = counting_effect(&signal);

        assert!(!signal.set(7));
        assert_eq!(runs.get(), 1);

        assert!(signal.set(8));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn reads_outside_effects_do_not_subscribe() {
        let signal = Signal::new(0);
        signal.get();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
            reader.get();
            reader.with(|_| ());
        });

        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn with_untracked_does_not_subscribe() {
        let signal = Signal::new(String::from("x"));
        let reader = signal.clone();
        let _effect = Effect::new(move || {
            reader.with_untracked(|s| s.len());
        });
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert!(signal1.ptr_eq(&signal2));
        assert!(!signal1.ptr_eq(&Signal::new(42)));
    }

    #[test]
    fn subscriber_added_during_notification_waits_for_next_write() {
        let signal = Signal::new(0);
        let late_runs = Rc::new(Cell::new(0));
        let spawned: Rc<RefCell<Vec<Effect>>> = Rc::new(RefCell::new(Vec::new()));

        let (reader, late, spawned_clone) =
            (signal.clone(), Rc::clone(&late_runs), Rc::clone(&spawned));
        let _spawner = Effect::new(move || {
            if reader.get() == 1 {
                let (inner_reader, inner_late) = (reader.clone(), Rc::clone(&late));
                spawned_clone.borrow_mut().push(Effect::new(move || {
                    inner_reader.get();
                    inner_late.set(inner_late.get() + 1);
                }));
            }
        });

        signal.set(1);
        // Ran once on creation only, not again in the pass that created it.
        assert_eq!(late_runs.get(), 1);

        signal.set(2);
        assert_eq!(late_runs.get(), 2);
    }
}
