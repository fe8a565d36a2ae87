//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive template
//! framework. It implements:
//!
//! - Reactive primitives (signals, effects, memos, watchers)
//! - A node compiler that wires template directives to effects
//! - Conditional mounting and keyed list reconciliation over a host tree
//! - Component loading, slots, renderer capabilities and teardown
//!
//! There is no virtual tree. Each binding in a compiled template is driven
//! by its own effect and updates exactly the host node it belongs to.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, effects and dependency tracking
//! - `dom`: the in-memory host tree and template descriptions
//! - `eval`: the expression evaluator contract and a built-in evaluator
//! - `compiler`: directive dispatch, interpolation, `v-if`, `v-for`, slots
//! - `component`: collaborator traits, registries and mount orchestration
//! - `lifecycle`: teardown callbacks keyed by host node
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{CompileContext, Runtime, Scope, Signal, TemplateNode, Value};
//!
//! let rt = Runtime::new();
//! let count = Signal::new(Value::from(1));
//! let scope = Scope::new();
//! scope.define("count", count.clone());
//!
//! let root = rt.document().create_element("main");
//! let template = TemplateNode::element("p").child(TemplateNode::text("Count: {{ count }}"));
//! let p = rt.render(&template, root, &CompileContext::new(scope));
//! assert_eq!(rt.document().text_content(p), "Count: 1");
//!
//! count.set(Value::from(2));
//! assert_eq!(rt.document().text_content(p), "Count: 2");
//! ```

pub mod compiler;
pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod eval;
pub mod lifecycle;
pub mod reactive;
pub mod runtime;
pub mod scope;
pub mod value;

pub use compiler::{CompileContext, ListExpression, Slots};
pub use component::{MountRequest, MountTarget};
pub use config::RuntimeConfig;
pub use dom::{Document, Event, NodeId, NodeKind, TemplateNode};
pub use error::{DirectiveError, Error, EvalError, MountError, Result};
pub use eval::{BasicEvaluator, Evaluator};
pub use lifecycle::Lifecycle;
pub use reactive::{create_effect, create_signal, untracked, watch, Effect, Memo, Signal};
pub use runtime::{Runtime, RuntimeBuilder};
pub use scope::{Binding, Callback, ListItem, Scope};
pub use value::Value;
