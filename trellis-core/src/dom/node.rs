//! Host Tree Nodes
//!
//! This module defines the node records stored in a [`Document`](super::Document).

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

/// Unique identifier for a node in a document.
///
/// Ids are never reused, so an id held by a closure either names the node it
/// was created for or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    /// Comments double as anchors for dynamically managed regions.
    Comment,
    /// A parentless holder, used for slot content.
    Fragment,
}

/// An event delivered to listeners.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
    pub detail: Value,
}

pub type Listener = Rc<dyn Fn(&Event)>;

pub(crate) struct ElementData {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub properties: IndexMap<String, Value>,
    pub listeners: IndexMap<String, Vec<Listener>>,
    pub hidden: bool,
    pub inner_html: Option<String>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            listeners: IndexMap::new(),
            hidden: false,
            inner_html: None,
        }
    }

    /// Copy without listeners.
    pub fn clone_static(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            attributes: self.attributes.clone(),
            properties: self.properties.clone(),
            listeners: IndexMap::new(),
            hidden: self.hidden,
            inner_html: self.inner_html.clone(),
        }
    }
}

pub(crate) enum NodeData {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }
}

pub(crate) struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Nodes owned by this anchor. They sit directly after it in its parent,
    /// in this order, whenever the anchor is attached.
    pub region: Vec<NodeId>,
}

impl Node {
    pub fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
            region: Vec::new(),
        }
    }
}
