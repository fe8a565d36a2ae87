//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This
//! enables automatic dependency tracking: when a signal is read, the signal
//! registers the current effect as a subscriber.
//!
//! # Implementation
//!
//! Each thread owns a stack of execution frames. Running an effect pushes a
//! frame and the returned guard pops it again, so nesting follows strict
//! stack discipline and the previous executor is restored even if the effect
//! panics. [`untracked`] pushes an empty frame, which hides the enclosing
//! effect from signal reads.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::EffectInner;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Rc<EffectInner>>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a context in which `effect` is the current executor.
    pub(crate) fn enter(effect: Rc<EffectInner>) -> Self {
        let subscriber_id = Some(effect.id());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(effect)));
        Self { subscriber_id }
    }

    /// Enter a context in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self {
            subscriber_id: None,
        }
    }

    /// Check whether a read right now would be tracked.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.as_ref().map(|effect| effect.id()))
        })
    }

    /// The effect currently executing, if reads should be tracked.
    pub(crate) fn current() -> Option<Rc<EffectInner>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Number of frames on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.as_ref().map(|effect| effect.id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without subscribing the current effect to anything it reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}
