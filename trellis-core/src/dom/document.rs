//! The in-memory host tree.
//!
//! A [`Document`] is an arena of nodes. It is a shared handle: clones refer
//! to the same tree, which is how effects and listeners created by the
//! compiler reach the nodes they update. Borrows of the arena never outlive
//! a single method call, and listeners are invoked after the borrow is
//! released, so a listener may freely mutate the tree.
//!
//! # Regions
//!
//! A node (normally a comment anchor) can own a region: an ordered list of
//! nodes that sit directly after it in its parent. Inserting, moving or
//! detaching a node carries its region along, recursively. A detached anchor
//! keeps its region bookkeeping, so re-attaching it restores the region too.

use std::cell::RefCell;
use std::fmt::{self, Write as _};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use super::node::{ElementData, Event, Listener, Node, NodeData, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Shared handle to a host tree.
#[derive(Clone, Default)]
pub struct Document {
    inner: Rc<RefCell<Tree>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .finish()
    }
}

#[derive(Default)]
struct Tree {
    nodes: Vec<Option<Node>>,
    stylesheets: IndexMap<String, String>,
}

impl Tree {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn insert(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Some(Node::new(data)));
        id
    }

    /// `id` followed by its region, recursively.
    fn span(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_span(id, &mut out);
        out
    }

    fn collect_span(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        out.push(id);
        for &member in &node.region {
            self.collect_span(member, out);
        }
    }

    fn region_end(&self, id: NodeId) -> NodeId {
        match self.node(id).and_then(|node| node.region.last()) {
            Some(&last) => self.region_end(last),
            None => id,
        }
    }

    fn position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node(parent)?.children.iter().position(|&c| c == child)
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|node| node.parent) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&c| c != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    fn link_at(&mut self, parent: NodeId, index: usize, ids: &[NodeId]) {
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        let index = index.min(node.children.len());
        node.children.splice(index..index, ids.iter().copied());
        for &id in ids {
            if let Some(child) = self.node_mut(id) {
                child.parent = Some(parent);
            }
        }
    }

    /// Whether `node` is `ancestor` or lies below it.
    fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Unlink the span of `node` unless doing so would create a cycle under
    /// `destination`.
    fn take_span(&mut self, node: NodeId, destination: NodeId) -> Option<Vec<NodeId>> {
        self.node(node)?;
        let span = self.span(node);
        if span.iter().any(|&id| self.is_within(destination, id)) {
            return None;
        }
        for &id in &span {
            self.unlink(id);
        }
        Some(span)
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- creation ------------------------------------------------------

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .insert(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_text(&self, text: impl Into<String>) -> NodeId {
        self.inner.borrow_mut().insert(NodeData::Text(text.into()))
    }

    pub fn create_comment(&self, text: impl Into<String>) -> NodeId {
        self.inner.borrow_mut().insert(NodeData::Comment(text.into()))
    }

    pub fn create_fragment(&self) -> NodeId {
        self.inner.borrow_mut().insert(NodeData::Fragment)
    }

    /// Deep-copy a subtree. Listeners and regions are not copied.
    pub fn clone_deep(&self, id: NodeId) -> Option<NodeId> {
        let mut tree = self.inner.borrow_mut();
        clone_into(&mut tree, id)
    }

    /// Drop a subtree (and the regions inside it) from the arena.
    ///
    /// Accessors on released ids return nothing and mutations are ignored.
    pub fn release(&self, id: NodeId) {
        let mut tree = self.inner.borrow_mut();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            tree.unlink(current);
            let Some(node) = tree.nodes.get_mut(current.index()).and_then(Option::take) else {
                continue;
            };
            stack.extend(node.children);
            stack.extend(node.region);
        }
    }

    // ---- inspection ----------------------------------------------------

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.borrow().node(id).is_some()
    }

    /// Number of live nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.iter().flatten().count()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.inner.borrow().node(id).map(|node| node.data.kind())
    }

    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.inner.borrow().element(id).map(|e| e.tag.clone())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.borrow().node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// Children of `id` that do not belong to a sibling's region. Moving
    /// each of these (with its region) moves every child exactly once.
    pub fn region_roots(&self, id: NodeId) -> Vec<NodeId> {
        let tree = self.inner.borrow();
        let Some(node) = tree.node(id) else {
            return Vec::new();
        };
        let owned: Vec<NodeId> = node
            .children
            .iter()
            .flat_map(|&child| tree.span(child).into_iter().skip(1))
            .collect();
        node.children
            .iter()
            .copied()
            .filter(|child| !owned.contains(child))
            .collect()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let tree = self.inner.borrow();
        let parent = tree.node(id)?.parent?;
        let index = tree.position(parent, id)?;
        tree.node(parent)?.children.get(index + 1).copied()
    }

    /// Element descendants of `root` with the given tag, in document order.
    pub fn query_all(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tree = self.inner.borrow();
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = tree
            .node(root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            let Some(node) = tree.node(id) else { continue };
            if matches!(&node.data, NodeData::Element(e) if e.tag.eq_ignore_ascii_case(tag)) {
                found.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    // ---- text ----------------------------------------------------------

    /// Text of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<String> {
        match &self.inner.borrow().node(id)?.data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn set_text(&self, id: NodeId, text: impl Into<String>) {
        let mut tree = self.inner.borrow_mut();
        if let Some(node) = tree.node_mut(id) {
            if let NodeData::Text(current) | NodeData::Comment(current) = &mut node.data {
                *current = text.into();
            }
        }
    }

    /// Concatenated text of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let tree = self.inner.borrow();
        let mut out = String::new();
        collect_text(&tree, id, &mut out);
        out
    }

    // ---- attributes and properties ------------------------------------

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.inner.borrow().element(id)?.attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .element(id)
            .map(|e| {
                e.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.inner.borrow_mut().element_mut(id) {
            element.attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.inner
            .borrow_mut()
            .element_mut(id)?
            .attributes
            .shift_remove(name)
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<Value> {
        self.inner.borrow().element(id)?.properties.get(name).cloned()
    }

    pub fn set_property(&self, id: NodeId, name: &str, value: Value) {
        if let Some(element) = self.inner.borrow_mut().element_mut(id) {
            element.properties.insert(name.to_string(), value);
        }
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.inner.borrow().element(id).is_some_and(|e| e.hidden)
    }

    pub fn set_hidden(&self, id: NodeId, hidden: bool) {
        if let Some(element) = self.inner.borrow_mut().element_mut(id) {
            element.hidden = hidden;
        }
    }

    pub fn inner_html(&self, id: NodeId) -> Option<String> {
        self.inner.borrow().element(id)?.inner_html.clone()
    }

    /// Replace an element's content with raw markup.
    pub fn set_inner_html(&self, id: NodeId, markup: impl Into<String>) {
        if let Some(element) = self.inner.borrow_mut().element_mut(id) {
            element.inner_html = Some(markup.into());
        }
    }

    // ---- structure -----------------------------------------------------

    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut tree = self.inner.borrow_mut();
        if tree.node(parent).is_none() {
            return;
        }
        let Some(span) = tree.take_span(child, parent) else {
            return;
        };
        let end = tree.node(parent).map_or(0, |p| p.children.len());
        tree.link_at(parent, end, &span);
    }

    /// Insert `node` (with its region) directly before `reference`.
    pub fn insert_before(&self, reference: NodeId, node: NodeId) {
        self.insert_relative(reference, node, 0);
    }

    /// Insert `node` (with its region) directly after `reference`.
    ///
    /// When `reference` is detached, `node` ends up detached as well.
    pub fn insert_after(&self, reference: NodeId, node: NodeId) {
        self.insert_relative(reference, node, 1);
    }

    fn insert_relative(&self, reference: NodeId, node: NodeId, offset: usize) {
        let mut tree = self.inner.borrow_mut();
        if tree.node(reference).is_none() || reference == node {
            return;
        }
        let Some(span) = tree.take_span(node, reference) else {
            return;
        };
        let Some(parent) = tree.node(reference).and_then(|n| n.parent) else {
            return;
        };
        if let Some(index) = tree.position(parent, reference) {
            tree.link_at(parent, index + offset, &span);
        }
    }

    /// Detach `node` and its region from their parent.
    pub fn detach(&self, node: NodeId) {
        let mut tree = self.inner.borrow_mut();
        for id in tree.span(node) {
            tree.unlink(id);
        }
    }

    /// Put `replacements` (with their regions) where `node` is and detach it.
    pub fn replace_with(&self, node: NodeId, replacements: &[NodeId]) {
        let mut tree = self.inner.borrow_mut();
        let slot = tree
            .node(node)
            .and_then(|n| n.parent)
            .and_then(|parent| Some((parent, tree.position(parent, node)?)));
        tree.unlink(node);

        let mut spans = Vec::new();
        for &replacement in replacements {
            if replacement == node {
                continue;
            }
            let span = match slot {
                Some((parent, _)) => tree.take_span(replacement, parent),
                None => tree.take_span(replacement, node),
            };
            spans.extend(span.unwrap_or_default());
        }
        if let Some((parent, index)) = slot {
            tree.link_at(parent, index, &spans);
        }
    }

    // ---- regions -------------------------------------------------------

    pub fn region(&self, anchor: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .node(anchor)
            .map(|node| node.region.clone())
            .unwrap_or_default()
    }

    /// Replace the bookkeeping of `anchor`'s region. Does not move nodes.
    pub fn set_region(&self, anchor: NodeId, members: Vec<NodeId>) {
        if let Some(node) = self.inner.borrow_mut().node_mut(anchor) {
            node.region = members;
        }
    }

    /// Insert `node` at the end of `anchor`'s region.
    pub fn push_region(&self, anchor: NodeId, node: NodeId) {
        let end = self.region_end(anchor);
        self.insert_after(end, node);
        if let Some(anchor) = self.inner.borrow_mut().node_mut(anchor) {
            anchor.region.push(node);
        }
    }

    pub fn remove_from_region(&self, anchor: NodeId, node: NodeId) {
        if let Some(anchor) = self.inner.borrow_mut().node_mut(anchor) {
            anchor.region.retain(|&member| member != node);
        }
    }

    /// Last node of `id`'s region, recursively; `id` itself when it owns none.
    pub fn region_end(&self, id: NodeId) -> NodeId {
        self.inner.borrow().region_end(id)
    }

    // ---- events --------------------------------------------------------

    pub fn add_event_listener(&self, id: NodeId, name: &str, listener: impl Fn(&Event) + 'static) {
        if let Some(element) = self.inner.borrow_mut().element_mut(id) {
            element
                .listeners
                .entry(name.to_string())
                .or_default()
                .push(Rc::new(listener));
        }
    }

    pub fn listener_count(&self, id: NodeId, name: &str) -> usize {
        self.inner
            .borrow()
            .element(id)
            .and_then(|e| e.listeners.get(name))
            .map_or(0, Vec::len)
    }

    /// Invoke the listeners for `name` on `id`. Returns how many ran.
    pub fn dispatch_event(&self, id: NodeId, name: &str, detail: Value) -> usize {
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .element(id)
            .and_then(|e| e.listeners.get(name))
            .cloned()
            .unwrap_or_default();

        let event = Event {
            name: name.to_string(),
            target: id,
            detail,
        };
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    // ---- styles --------------------------------------------------------

    /// Register a stylesheet under `key`. Re-registering a key replaces it.
    pub fn add_stylesheet(&self, key: impl Into<String>, css: impl Into<String>) {
        self.inner
            .borrow_mut()
            .stylesheets
            .insert(key.into(), css.into());
    }

    pub fn stylesheets(&self) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .stylesheets
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ---- serialization -------------------------------------------------

    /// Serialize a subtree as markup. Hidden elements carry `hidden`.
    pub fn to_markup(&self, id: NodeId) -> String {
        let tree = self.inner.borrow();
        let mut out = String::new();
        write_markup(&tree, id, &mut out);
        out
    }
}

fn clone_into(tree: &mut Tree, id: NodeId) -> Option<NodeId> {
    let node = tree.node(id)?;
    let data = match &node.data {
        NodeData::Element(element) => NodeData::Element(element.clone_static()),
        NodeData::Text(text) => NodeData::Text(text.clone()),
        NodeData::Comment(text) => NodeData::Comment(text.clone()),
        NodeData::Fragment => NodeData::Fragment,
    };
    let children = node.children.clone();
    let copy = tree.insert(data);
    let cloned: Vec<NodeId> = children
        .into_iter()
        .filter_map(|child| clone_into(tree, child))
        .collect();
    let end = tree.node(copy).map_or(0, |n| n.children.len());
    tree.link_at(copy, end, &cloned);
    Some(copy)
}

fn collect_text(tree: &Tree, id: NodeId, out: &mut String) {
    let Some(node) = tree.node(id) else { return };
    if let NodeData::Text(text) = &node.data {
        out.push_str(text);
    }
    for &child in &node.children {
        collect_text(tree, child, out);
    }
}

fn escape(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

fn write_markup(tree: &Tree, id: NodeId, out: &mut String) {
    let Some(node) = tree.node(id) else { return };
    match &node.data {
        NodeData::Text(text) => escape(text, out),
        NodeData::Comment(text) => {
            let _ = write!(out, "<!--{text}-->");
        }
        NodeData::Fragment => {
            for &child in &node.children {
                write_markup(tree, child, out);
            }
        }
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    escape(value, out);
                    out.push('"');
                }
            }
            if element.hidden {
                out.push_str(" hidden");
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                return;
            }
            match &element.inner_html {
                Some(markup) => out.push_str(markup),
                None => {
                    for &child in &node.children {
                        write_markup(tree, child, out);
                    }
                }
            }
            let _ = write!(out, "</{}>", element.tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn list(doc: &Document) -> (NodeId, NodeId) {
        let ul = doc.create_element("ul");
        let anchor = doc.create_comment("list");
        doc.append_child(ul, anchor);
        (ul, anchor)
    }

    #[test]
    fn build_and_serialize() {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "card");
        let text = doc.create_text("a < b");
        doc.append_child(div, text);
        let input = doc.create_element("input");
        doc.set_attribute(input, "disabled", "");
        doc.append_child(div, input);

        assert_eq!(
            doc.to_markup(div),
            r#"<div class="card">a &lt; b<input disabled></div>"#
        );
        assert_eq!(doc.text_content(div), "a < b");
    }

    #[test]
    fn regions_move_with_their_anchor() {
        let doc = Document::new();
        let (ul, anchor) = list(&doc);
        let tail = doc.create_element("footer");
        doc.append_child(ul, tail);

        let a = doc.create_element("li");
        let b = doc.create_element("li");
        doc.push_region(anchor, a);
        doc.push_region(anchor, b);
        assert_eq!(doc.children(ul), vec![anchor, a, b, tail]);
        assert_eq!(doc.region_end(anchor), b);

        // Moving the anchor after the footer takes the region along.
        doc.insert_after(tail, anchor);
        assert_eq!(doc.children(ul), vec![tail, anchor, a, b]);

        doc.detach(anchor);
        assert_eq!(doc.children(ul), vec![tail]);
        assert_eq!(doc.region(anchor), vec![a, b]);

        doc.append_child(ul, anchor);
        assert_eq!(doc.children(ul), vec![tail, anchor, a, b]);
    }

    #[test]
    fn nested_regions_are_part_of_the_span() {
        let doc = Document::new();
        let (ul, outer) = list(&doc);
        let inner = doc.create_comment("inner");
        doc.push_region(outer, inner);
        let leaf = doc.create_element("li");
        doc.push_region(inner, leaf);

        assert_eq!(doc.children(ul), vec![outer, inner, leaf]);
        assert_eq!(doc.region_end(outer), leaf);
    }

    #[test]
    fn replace_with_keeps_position() {
        let doc = Document::new();
        let p = doc.create_element("p");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        let c = doc.create_text("c");
        for n in [a, b, c] {
            doc.append_child(p, n);
        }
        let x = doc.create_text("x");
        let y = doc.create_text("y");
        doc.replace_with(b, &[x, y]);
        assert_eq!(doc.children(p), vec![a, x, y, c]);
        assert_eq!(doc.parent(b), None);
    }

    #[test]
    fn refuses_to_create_cycles() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner);
        doc.append_child(inner, outer);
        assert_eq!(doc.parent(outer), None);
        assert_eq!(doc.children(inner), Vec::<NodeId>::new());
    }

    #[test]
    fn clone_deep_skips_listeners() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append_child(button, doc.create_text("go"));
        doc.add_event_listener(button, "click", |_| {});

        let copy = doc.clone_deep(button).unwrap();
        assert_ne!(copy, button);
        assert_eq!(doc.to_markup(copy), "<button>go</button>");
        assert_eq!(doc.listener_count(copy, "click"), 0);
    }

    #[test]
    fn listeners_may_mutate_the_tree() {
        let doc = Document::new();
        let button = doc.create_element("button");
        let hits = Rc::new(Cell::new(0));
        let (handle, counter) = (doc.clone(), Rc::clone(&hits));
        doc.add_event_listener(button, "click", move |event| {
            counter.set(counter.get() + 1);
            handle.set_attribute(event.target, "data-clicked", event.detail.to_string());
        });

        assert_eq!(doc.dispatch_event(button, "click", json!(1)), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(doc.attribute(button, "data-clicked").as_deref(), Some("1"));
        assert_eq!(doc.dispatch_event(button, "keyup", json!(null)), 0);
    }

    #[test]
    fn released_nodes_are_gone() {
        let doc = Document::new();
        let (ul, anchor) = list(&doc);
        let li = doc.create_element("li");
        doc.push_region(anchor, li);
        let before = doc.node_count();

        doc.release(anchor);
        assert!(!doc.contains(anchor));
        assert!(!doc.contains(li));
        assert_eq!(doc.node_count(), before - 2);
        assert!(doc.children(ul).is_empty());
        doc.set_attribute(li, "x", "y");
    }
}
