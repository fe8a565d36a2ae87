//! Host Tree
//!
//! The runtime renders into an in-memory tree of elements, text and comment
//! nodes. Anything that needs to reach a real display surface (a browser
//! binding, a scene graph) observes or mirrors this tree.

mod document;
mod node;
mod template;

pub use document::Document;
pub use node::{Event, Listener, NodeId, NodeKind};
pub use template::TemplateNode;
