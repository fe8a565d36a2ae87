//! Owned template trees.
//!
//! Parsing markup is the structural parser's job; what it hands the runtime
//! is a tree of [`TemplateNode`]s, which [`Document::materialize`] turns into
//! host nodes ready for compilation.

use serde::{Deserialize, Serialize};

use super::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateNode {
    Element {
        tag: String,
        #[serde(default)]
        attributes: Vec<(String, String)>,
        #[serde(default)]
        children: Vec<TemplateNode>,
    },
    Text(String),
    Comment(String),
}

impl TemplateNode {
    pub fn element(tag: impl Into<String>) -> Self {
        TemplateNode::Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        TemplateNode::Text(text.into())
    }

    pub fn comment(text: impl Into<String>) -> Self {
        TemplateNode::Comment(text.into())
    }

    /// Add an attribute. No-op on text and comments.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let TemplateNode::Element { attributes, .. } = &mut self {
            attributes.push((name.into(), value.into()));
        }
        self
    }

    /// Add a child. No-op on text and comments.
    pub fn child(mut self, child: TemplateNode) -> Self {
        if let TemplateNode::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    pub fn children(self, children: impl IntoIterator<Item = TemplateNode>) -> Self {
        children.into_iter().fold(self, TemplateNode::child)
    }

    /// Whitespace-only text carries no content.
    pub fn is_blank(&self) -> bool {
        matches!(self, TemplateNode::Text(text) if text.trim().is_empty())
    }
}

impl Document {
    /// Create detached host nodes for `template`.
    pub fn materialize(&self, template: &TemplateNode) -> NodeId {
        match template {
            TemplateNode::Text(text) => self.create_text(text.as_str()),
            TemplateNode::Comment(text) => self.create_comment(text.as_str()),
            TemplateNode::Element {
                tag,
                attributes,
                children,
            } => {
                let element = self.create_element(tag);
                for (name, value) in attributes {
                    self.set_attribute(element, name, value.as_str());
                }
                for child in children {
                    let node = self.materialize(child);
                    self.append_child(element, node);
                }
                element
            }
        }
    }
}
