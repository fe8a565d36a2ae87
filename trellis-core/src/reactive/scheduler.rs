//! Microtask Scheduler
//!
//! Effects run synchronously, so a burst of writes re-runs them once per
//! write. Watchers want the opposite: one notification after the burst. They
//! defer their callback onto a per-thread microtask queue and only enqueue it
//! once per burst, so the callback observes the latest value when the queue
//! is flushed (trailing-edge coalescing).
//!
//! # Algorithm
//!
//! 1. A watched source changes and its watcher effect re-runs.
//! 2. The watcher stores the new value and, unless a flush is already
//!    pending for it, pushes a microtask.
//! 3. [`flush_microtasks`] drains the queue in FIFO order, including tasks
//!    queued by tasks that run during the flush.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::context::untracked;
use super::effect::Effect;

type Microtask = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Microtask>> = RefCell::new(VecDeque::new());
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Defer `task` until the next [`flush_microtasks`].
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
}

/// Number of tasks waiting in the queue.
pub fn pending_microtasks() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// Run queued microtasks until the queue is empty.
///
/// Returns the number of tasks run. A flush requested from inside a running
/// microtask returns immediately; the outer flush picks up the remaining work.
pub fn flush_microtasks() -> usize {
    if FLUSHING.with(|flushing| flushing.replace(true)) {
        return 0;
    }

    let mut ran = 0;
    while let Some(task) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
        untracked(task);
        ran += 1;
    }

    FLUSHING.with(|flushing| flushing.set(false));
    ran
}

/// Handle to a watcher created by [`watch`].
#[derive(Clone)]
pub struct Watcher {
    effect: Effect,
    active: Rc<Cell<bool>>,
}

impl Watcher {
    /// Stop watching. A callback already queued will not fire.
    pub fn stop(&self) {
        self.active.set(false);
        self.effect.stop();
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Observe `source` and call `callback(new, old)` after it changes.
///
/// The first evaluation only records the initial value. Several changes
/// before the next flush produce one call carrying the value seen at flush
/// time and the value seen by the previous call. Nothing fires when the
/// value has returned to where it started.
pub fn watch<T, S, C>(source: S, callback: C) -> Watcher
where
    T: Clone + PartialEq + 'static,
    S: Fn() -> T + 'static,
    C: FnMut(&T, &T) + 'static,
{
    struct WatchState<T> {
        delivered: Option<T>,
        latest: Option<T>,
        pending: bool,
    }

    let state = Rc::new(RefCell::new(WatchState {
        delivered: None,
        latest: None,
        pending: false,
    }));
    let callback = Rc::new(RefCell::new(callback));
    let active = Rc::new(Cell::new(true));

    let effect_state = state;
    let effect_active = Rc::clone(&active);
    let effect = Effect::new(move || {
        let value = source();
        let mut guard = effect_state.borrow_mut();
        if guard.delivered.is_none() {
            guard.delivered = Some(value);
            return;
        }
        guard.latest = Some(value);
        if guard.pending {
            return;
        }
        guard.pending = true;
        drop(guard);

        let (task_state, task_callback, task_active) = (
            Rc::clone(&effect_state),
            Rc::clone(&callback),
            Rc::clone(&effect_active),
        );
        queue_microtask(move || {
            let mut guard = task_state.borrow_mut();
            guard.pending = false;
            let Some(latest) = guard.latest.take() else {
                return;
            };
            let previous = guard.delivered.replace(latest.clone());
            drop(guard);
            if !task_active.get() {
                return;
            }
            if let Some(previous) = previous {
                if previous != latest {
                    let mut callback = task_callback.borrow_mut();
                    (*callback)(&latest, &previous);
                }
            }
        });
    });

    Watcher { effect, active }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    fn recording_watch(signal: &Signal<i32>) -> (Watcher, Rc<RefCell<Vec<(i32, i32)>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (reader, calls_clone) = (signal.clone(), Rc::clone(&calls));
        let watcher = watch(
            move || reader.get(),
            move |new, old| calls_clone.borrow_mut().push((*new, *old)),
        );
        (watcher, calls)
    }

    #[test]
    fn microtasks_run_in_fifo_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = Rc::clone(&order);
            queue_microtask(move || order.borrow_mut().push(n));
        }
        assert_eq!(pending_microtasks(), 3);
        assert_eq!(flush_microtasks(), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_queued_during_flush_run_in_same_flush() {
        let hits = Rc::new(Cell::new(0));
        let outer = Rc::clone(&hits);
        queue_microtask(move || {
            outer.set(outer.get() + 1);
            let inner = Rc::clone(&outer);
            queue_microtask(move || inner.set(inner.get() + 1));
        });
        assert_eq!(flush_microtasks(), 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn watch_coalesces_same_tick_writes() {
        let signal = Signal::new(0);
        let (_watcher, calls) = recording_watch(&signal);

        signal.set(1);
        signal.set(2);
        signal.set(3);
        assert!(calls.borrow().is_empty());

        flush_microtasks();
        assert_eq!(*calls.borrow(), vec![(3, 0)]);

        signal.set(4);
        flush_microtasks();
        assert_eq!(*calls.borrow(), vec![(3, 0), (4, 3)]);
    }

    #[test]
    fn watch_skips_round_trip_back_to_old_value() {
        let signal = Signal::new(5);
        let (_watcher, calls) = recording_watch(&signal);

        signal.set(6);
        signal.set(5);
        flush_microtasks();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn stopped_watcher_drops_queued_callback() {
        let signal = Signal::new(0);
        let (watcher, calls) = recording_watch(&signal);

        signal.set(1);
        watcher.stop();
        flush_microtasks();
        assert!(calls.borrow().is_empty());
        assert!(!watcher.is_active());
    }
}
