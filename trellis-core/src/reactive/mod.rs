//! Reactive Primitives
//!
//! This module implements the reactive graph: signals, effects, memos and
//! watchers. Everything else in the crate is built from these.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while an effect runs, the signal registers that effect as a subscriber.
//! When the value changes, the subscribers re-run.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read during its previous run changes. The compiler drives every live
//! binding in the host tree with one effect.
//!
//! ## Memos and watchers
//!
//! A Memo is a derived value recomputed by an internal effect. A watcher
//! defers its callback to the microtask queue so a burst of writes produces
//! one notification.
//!
//! # Implementation Notes
//!
//! The system is single-threaded. Each thread keeps a stack of running
//! effects ([`ReactiveContext`]); reading a signal consults the top of that
//! stack. Writes re-run subscribers synchronously and depth-first. There is
//! no batching.

mod context;
mod effect;
mod memo;
mod scheduler;
mod signal;
mod subscriber;

pub use context::{untracked, ReactiveContext};
pub use effect::{create_effect, Effect};
pub use memo::Memo;
pub use scheduler::{flush_microtasks, pending_microtasks, queue_microtask, watch, Watcher};
pub use signal::{create_signal, Signal};
pub use subscriber::SubscriberId;
