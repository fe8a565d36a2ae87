//! Memo Implementation
//!
//! A Memo is a derived value. An internal effect recomputes it whenever one of
//! its inputs changes and writes the result into a private signal. Readers
//! subscribe to that signal, so a recomputation that yields an equal value
//! re-runs nobody downstream.

use std::fmt::{self, Debug};

use super::effect::Effect;
use super::signal::Signal;

/// A derived reactive value.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let reader = count.clone();
/// let doubled = Memo::new(move || reader.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(3);
/// assert_eq!(doubled.get(), 6);
/// ```
pub struct Memo<T> {
    value: Signal<Option<T>>,
    effect: Effect,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a memo and compute its first value immediately.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let value = Signal::new(None);
        let target = value.clone();
        let effect = Effect::new(move || {
            target.set(Some(compute()));
        });
        Self { value, effect }
    }

    /// Get the current value, subscribing the running effect.
    pub fn get(&self) -> T {
        self.value
            .get()
            .expect("memo computes its value on creation")
    }

    /// Get the current value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.value
            .get_untracked()
            .expect("memo computes its value on creation")
    }

    /// Number of times the value has been computed.
    pub fn compute_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.effect.stop();
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.value)
            .field("compute_count", &self.effect.run_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn memo_tracks_signal() {
        let count = Signal::new(2);
        let reader = count.clone();
        let doubled = Memo::new(move || reader.get() * 2);

        assert_eq!(doubled.get(), 4);
        count.set(5);
        assert_eq!(doubled.get(), 10);
        assert_eq!(doubled.compute_count(), 2);
    }

    #[test]
    fn equal_recomputation_does_not_notify_readers() {
        let count = Signal::new(1);
        let reader = count.clone();
        let parity = Memo::new(move || reader.get() % 2);

        let runs = Rc::new(Cell::new(0));
        let (memo, runs_clone) = (parity.clone(), Rc::clone(&runs));
        let _effect = Effect::new(move || {
            memo.get();
            runs_clone.set(runs_clone.get() + 1);
        });

        count.set(3);
        assert_eq!(runs.get(), 1);
        count.set(4);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn disposed_memo_keeps_last_value() {
        let count = Signal::new(1);
        let reader = count.clone();
        let memo = Memo::new(move || reader.get() + 1);

        memo.dispose();
        count.set(10);
        assert_eq!(memo.get_untracked(), 2);
    }
}
