//! Lifecycle Manager
//!
//! A side table from host nodes to the teardown callbacks that must run when
//! they leave the tree: stopping binding effects, destroying renderer
//! objects, running a component's unmounted hooks.
//!
//! Cleanup is post-order. A node's children and region are cleaned before
//! its own callbacks run, so the innermost teardowns always fire first. Each
//! callback is removed from the table before it is invoked, which makes it
//! fire at most once however often cleanup is requested, and lets a callback
//! trigger further cleanup without deadlocking the table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::dom::{Document, NodeId};
use crate::error::Error;

type Teardown = Box<dyn FnOnce() -> Result<(), Error>>;

#[derive(Clone)]
pub struct Lifecycle {
    document: Document,
    teardowns: Rc<RefCell<HashMap<NodeId, SmallVec<[Teardown; 2]>>>>,
}

impl Lifecycle {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            teardowns: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Run `teardown` when `node` is cleaned up.
    pub fn register(&self, node: NodeId, teardown: impl FnOnce() + 'static) {
        self.try_register(node, move || {
            teardown();
            Ok::<(), Error>(())
        });
    }

    /// Register a teardown that may fail. Failures are logged.
    pub fn try_register<F, E>(&self, node: NodeId, teardown: F)
    where
        F: FnOnce() -> Result<(), E> + 'static,
        E: Into<Error>,
    {
        self.teardowns
            .borrow_mut()
            .entry(node)
            .or_default()
            .push(Box::new(move || teardown().map_err(Into::into)));
    }

    /// Whether `node` has pending teardowns.
    pub fn is_registered(&self, node: NodeId) -> bool {
        self.teardowns.borrow().contains_key(&node)
    }

    /// Total number of pending teardown callbacks.
    pub fn pending(&self) -> usize {
        self.teardowns.borrow().values().map(SmallVec::len).sum()
    }

    /// Run every teardown at or below `node`, innermost first.
    ///
    /// Returns the number of callbacks invoked. Nodes stay in the tree.
    pub fn cleanup(&self, node: NodeId) -> usize {
        let mut fired = 0;
        let below = self
            .document
            .children(node)
            .into_iter()
            .chain(self.document.region(node));
        for child in below {
            fired += self.cleanup(child);
        }

        let callbacks = self.teardowns.borrow_mut().remove(&node);
        for teardown in callbacks.into_iter().flatten() {
            fired += 1;
            if let Err(error) = teardown() {
                tracing::warn!(node = node.raw(), %error, "teardown failed");
            }
        }
        fired
    }

    /// Clean up `node`, detach it with its region, and release it.
    pub fn cleanup_and_remove(&self, node: NodeId) -> usize {
        let fired = self.cleanup(node);
        self.document.detach(node);
        self.document.release(node);
        fired
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("pending", &self.pending())
            .finish()
    }
}
