//! Registries adapters plug into.
//!
//! - [`ComponentRegistry`] backs a tag with a [`RendererCapability`] instead
//!   of the template compiler.
//! - [`DirectiveRegistry`] adds custom `v-<name>` directives.
//! - [`ProvideContext`] passes capabilities down the instantiation chain.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::provider::{Emitter, Props};
use crate::dom::{Document, NodeId};
use crate::error::RenderError;
use crate::value::Value;

/// Everything a renderer gets when one of its tags is instantiated.
pub struct RenderRequest {
    pub tag: String,
    /// Comment node marking where the object belongs in the host tree.
    pub anchor: NodeId,
    pub document: Document,
    pub props: Props,
    pub emit: Emitter,
    pub context: ProvideContext,
}

/// A custom backend for a tag, such as a scene-graph object.
pub trait RendererCapability {
    fn create(&self, request: &RenderRequest) -> Result<Box<dyn Any>, RenderError>;

    fn destroy(&self, handle: Box<dyn Any>);

    fn set_visibility(&self, handle: &dyn Any, visible: bool);
}

#[derive(Clone, Default)]
pub struct ComponentRegistry {
    renderers: Rc<RefCell<IndexMap<String, Rc<dyn RendererCapability>>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back `tag` with `renderer`. Replaces any previous registration.
    pub fn register(&self, tag: &str, renderer: Rc<dyn RendererCapability>) {
        self.renderers
            .borrow_mut()
            .insert(tag.to_ascii_lowercase(), renderer);
    }

    pub fn unregister(&self, tag: &str) -> bool {
        self.renderers
            .borrow_mut()
            .shift_remove(&tag.to_ascii_lowercase())
            .is_some()
    }

    pub fn get(&self, tag: &str) -> Option<Rc<dyn RendererCapability>> {
        self.renderers
            .borrow()
            .get(&tag.to_ascii_lowercase())
            .cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.renderers
            .borrow()
            .contains_key(&tag.to_ascii_lowercase())
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.renderers.borrow().keys())
            .finish()
    }
}

/// The value handed to a custom directive each time its expression changes.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveBinding {
    pub value: Value,
    /// `None` on the first update.
    pub old_value: Option<Value>,
    /// The part after `:` in `v-name:arg`.
    pub arg: Option<String>,
    pub expression: String,
}

pub trait CustomDirective {
    fn update(&self, document: &Document, node: NodeId, binding: &DirectiveBinding);

    /// Called once when the node is torn down.
    fn unmount(&self, _document: &Document, _node: NodeId) {}
}

impl<F> CustomDirective for F
where
    F: Fn(&Document, NodeId, &DirectiveBinding),
{
    fn update(&self, document: &Document, node: NodeId, binding: &DirectiveBinding) {
        self(document, node, binding)
    }
}

#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    directives: Rc<RefCell<IndexMap<String, Rc<dyn CustomDirective>>>>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `v-<name>`.
    pub fn register(&self, name: &str, directive: impl CustomDirective + 'static) {
        self.directives
            .borrow_mut()
            .insert(name.to_string(), Rc::new(directive));
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn CustomDirective>> {
        self.directives.borrow().get(name).cloned()
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.directives.borrow().keys())
            .finish()
    }
}

/// Scoped provide/get of capabilities.
///
/// Each component instance gets a child of its parent's context, so a value
/// provided by an ancestor is visible to every descendant while a value
/// provided by a descendant stays invisible to its ancestors.
#[derive(Clone, Default)]
pub struct ProvideContext {
    inner: Rc<ContextLayer>,
}

#[derive(Default)]
struct ContextLayer {
    values: RefCell<IndexMap<String, Rc<dyn Any>>>,
    parent: Option<ProvideContext>,
}

impl ProvideContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(ContextLayer {
                values: RefCell::new(IndexMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn provide<T: Any>(&self, key: impl Into<String>, value: T) {
        self.inner
            .values
            .borrow_mut()
            .insert(key.into(), Rc::new(value));
    }

    /// The nearest value provided under `key`, if it has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<Rc<T>> {
        let mut layer = self;
        loop {
            if let Some(value) = layer.inner.values.borrow().get(key) {
                return Rc::clone(value).downcast::<T>().ok();
            }
            layer = layer.inner.parent.as_ref()?;
        }
    }
}

impl fmt::Debug for ProvideContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvideContext")
            .field("keys", &self.inner.values.borrow().keys().collect::<Vec<_>>())
            .field("parent", &self.inner.parent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl RendererCapability for Noop {
        fn create(&self, _: &RenderRequest) -> Result<Box<dyn Any>, RenderError> {
            Ok(Box::new(()))
        }
        fn destroy(&self, _: Box<dyn Any>) {}
        fn set_visibility(&self, _: &dyn Any, _: bool) {}
    }

    #[test]
    fn registry_is_case_insensitive() {
        let registry = ComponentRegistry::new();
        registry.register("Scene-View", Rc::new(Noop));
        assert!(registry.contains("scene-view"));
        assert!(registry.get("SCENE-VIEW").is_some());
        assert!(registry.unregister("scene-view"));
        assert!(!registry.contains("scene-view"));
    }

    #[test]
    fn context_values_flow_down_not_up() {
        let root = ProvideContext::new();
        root.provide("theme", String::from("dark"));
        let child = root.child();
        child.provide("depth", 1_u32);

        assert_eq!(child.get::<String>("theme").as_deref().map(String::as_str), Some("dark"));
        assert_eq!(child.get::<u32>("depth").as_deref(), Some(&1));
        assert!(root.get::<u32>("depth").is_none());
        assert!(child.get::<u32>("theme").is_none());
    }

    #[test]
    fn closures_are_directives() {
        let registry = DirectiveRegistry::new();
        registry.register("focus", |doc: &Document, node: NodeId, _: &DirectiveBinding| {
            doc.set_property(node, "focused", Value::Bool(true));
        });
        let doc = Document::new();
        let input = doc.create_element("input");
        let directive = registry.get("focus").unwrap();
        directive.update(
            &doc,
            input,
            &DirectiveBinding {
                value: Value::Null,
                old_value: None,
                arg: None,
                expression: String::new(),
            },
        );
        assert_eq!(doc.property(input, "focused"), Some(Value::Bool(true)));
    }
}
