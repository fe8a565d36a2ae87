//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever a signal it
//! read during its previous run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the signal re-runs the effect
//!    synchronously.
//!
//! 3. Before re-running, the effect leaves every subscriber set it joined
//!    during the previous run, then rejoins exactly the sets of the signals
//!    it reads this time. A run's subscriptions therefore always mirror that
//!    run's reads.
//!
//! 4. A failing run is reported and swallowed. The effect stays active and
//!    runs again on the next change.
//!
//! 5. A change delivered while the effect is already running cannot re-enter
//!    it. The effect is marked instead and runs again as soon as the current
//!    run returns, before control goes back to the writer. An effect that
//!    normalizes a cell it has just read therefore always ends on the final
//!    value.
//!
//! # Lifetime
//!
//! Signals hold their subscribers strongly, so an effect stays alive while it
//! is subscribed to anything, even after its handle is dropped. [`Effect::stop`]
//! leaves every subscriber set and makes the effect permanently inert.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{SubscriberId, SubscriberSet};
use crate::error::Error;

type EffectFn = Box<dyn FnMut() -> Result<(), Error>>;

/// Back-to-back reruns allowed before an effect is considered runaway.
const MAX_RERUNS: usize = 100;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let reader = count.clone();
/// let effect = Effect::new(move || {
///     println!("count is {}", reader.get());
/// });
///
/// count.set(5); // prints "count is 5"
/// effect.stop();
/// count.set(6); // prints nothing
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

pub(crate) struct EffectInner {
    id: SubscriberId,
    run: RefCell<EffectFn>,
    active: Cell<bool>,
    /// Set when a dependency changed during a run.
    rerun_pending: Cell<bool>,
    /// Subscriber sets joined during the latest run. Weak: the effect never
    /// keeps a signal alive.
    dependencies: RefCell<SmallVec<[Weak<SubscriberSet>; 4]>>,
    run_count: Cell<usize>,
}

impl Effect {
    /// Create a new effect and run it once to seed its dependencies.
    pub fn new<F>(mut run: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self::try_new(move || {
            run();
            Ok::<(), Error>(())
        })
    }

    /// Create an effect whose runs may fail.
    ///
    /// A failed run is logged and otherwise ignored.
    pub fn try_new<F, E>(run: F) -> Self
    where
        F: FnMut() -> Result<(), E> + 'static,
        E: Into<Error>,
    {
        let effect = Self::new_lazy(run);
        effect.run();
        effect
    }

    /// Create an effect without running it.
    ///
    /// It has no dependencies until [`run`](Self::run) is called.
    pub fn new_lazy<F, E>(mut run: F) -> Self
    where
        F: FnMut() -> Result<(), E> + 'static,
        E: Into<Error>,
    {
        Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                run: RefCell::new(Box::new(move || run().map_err(Into::into))),
                active: Cell::new(true),
                rerun_pending: Cell::new(false),
                dependencies: RefCell::new(SmallVec::new()),
                run_count: Cell::new(0),
            }),
        }
    }

    /// Get the subscriber ID of this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the effect now. A no-op once stopped.
    pub fn run(&self) {
        self.inner.run();
    }

    /// Stop the effect: leave every subscriber set and never run again.
    ///
    /// Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Check whether the effect is still active.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of live subscriber sets this effect belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .dependencies
            .borrow()
            .iter()
            .filter(|set| set.upgrade().is_some())
            .count()
    }
}

impl EffectInner {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn run(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }

        // Already running further up the stack: the outer call picks the
        // change up once the current run returns.
        let Ok(mut run) = self.run.try_borrow_mut() else {
            tracing::trace!(effect = self.id.raw(), "deferring re-entrant effect run");
            self.rerun_pending.set(true);
            return;
        };

        let mut reruns = 0;
        loop {
            self.rerun_pending.set(false);
            self.detach();

            let result = {
                let _ctx = ReactiveContext::enter(Rc::clone(self));
                run()
            };
            self.run_count.set(self.run_count.get() + 1);

            // Stopped while running: drop whatever the rest of the run subscribed to.
            if !self.active.get() {
                self.detach();
            }

            if let Err(error) = result {
                tracing::warn!(effect = self.id.raw(), %error, "effect run failed");
            }

            if !self.rerun_pending.get() || !self.active.get() {
                break;
            }
            reruns += 1;
            if reruns > MAX_RERUNS {
                tracing::warn!(effect = self.id.raw(), reruns, "effect keeps invalidating itself; giving up");
                self.rerun_pending.set(false);
                break;
            }
        }
    }

    pub(crate) fn stop(&self) {
        self.active.set(false);
        self.detach();
    }

    /// Record that this effect joined `set` during the current run.
    pub(crate) fn add_dependency(&self, set: &Rc<SubscriberSet>) {
        self.dependencies.borrow_mut().push(Rc::downgrade(set));
    }

    fn detach(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
        for set in dependencies.iter().filter_map(Weak::upgrade) {
            set.remove(self.id);
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Create an effect and return the function that stops it.
pub fn create_effect<F>(f: F) -> impl Fn()
where
    F: FnMut() + 'static,
{
    let effect = Effect::new(f);
    move || effect.stop()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::reactive::Signal;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = Rc::clone(&run_count);

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let effect = Effect::new_lazy(|| Ok::<(), Error>(()));
        assert_eq!(effect.run_count(), 0);

        effect.run();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let reader = signal.clone();
        let seen_clone = Rc::clone(&seen);
        let effect = Effect::new(move || seen_clone.borrow_mut().push(reader.get()));

        signal.set(2);
        signal.set(3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_does_not_run_after_stop() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
        });
        assert_eq!(effect.dependency_count(), 1);

        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        effect.run();
        assert_eq!(effect.run_count(), 1);

        // Idempotent.
        effect.stop();
    }

    #[test]
    fn stop_function_from_create_effect() {
        let signal = Signal::new(0);
        let runs = Rc::new(Cell::new(0));
        let (reader, runs_clone) = (signal.clone(), Rc::clone(&runs));
        let stop = create_effect(move || {
            reader.get();
            runs_clone.set(runs_clone.get() + 1);
        });

        signal.set(1);
        stop();
        signal.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn failing_run_keeps_effect_active() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::try_new(move || {
            if reader.get() % 2 == 1 {
                return Err(EvalError::custom("odd"));
            }
            Ok(())
        });

        signal.set(1);
        assert!(effect.is_active());
        signal.set(2);
        assert_eq!(effect.run_count(), 3);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn effect_survives_dropped_handle_while_subscribed() {
        let signal = Signal::new(0);
        let runs = Rc::new(Cell::new(0));
        {
            let (reader, runs_clone) = (signal.clone(), Rc::clone(&runs));
            Effect::new(move || {
                reader.get();
                runs_clone.set(runs_clone.get() + 1);
            });
        }

        signal.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn self_triggering_effect_reruns_without_recursing() {
        let signal = Signal::new(0);
        let handle = signal.clone();
        let effect = Effect::new(move || {
            let value = handle.get();
            if value < 10 {
                handle.set(value + 1);
            }
        });

        assert_eq!(signal.get_untracked(), 10);
        assert_eq!(effect.run_count(), 11);
    }

    #[test]
    fn effect_sees_its_own_normalizing_write() {
        let signal = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (handle, log) = (signal.clone(), Rc::clone(&seen));
        let _effect = Effect::new(move || {
            let value = handle.get();
            log.borrow_mut().push(value);
            if value > 10 {
                handle.set(10);
            }
        });

        signal.set(11);
        assert_eq!(signal.get_untracked(), 10);
        assert_eq!(*seen.borrow(), vec![0, 11, 10]);
    }

    #[test]
    fn runaway_effect_gives_up() {
        let signal = Signal::new(0);
        let handle = signal.clone();
        let effect = Effect::new(move || {
            let value = handle.get();
            handle.set(value + 1);
        });

        assert_eq!(effect.run_count(), MAX_RERUNS + 1);
        assert!(effect.is_active());
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn stopping_itself_mid_run_drops_later_reads() {
        let first = Signal::new(0);
        let second = Signal::new(0);
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));

        let (a, b, slot_clone) = (first.clone(), second.clone(), Rc::clone(&slot));
        let effect = Effect::new_lazy(move || {
            a.get();
            if let Some(me) = slot_clone.borrow().as_ref() {
                me.stop();
            }
            b.get();
            Ok::<(), Error>(())
        });
        *slot.borrow_mut() = Some(effect.clone());
        effect.run();

        assert_eq!(first.subscriber_count(), 0);
        assert_eq!(second.subscriber_count(), 0);
        slot.borrow_mut().take();
    }
}
