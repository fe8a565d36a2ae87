//! Collaborator contracts for loading components.
//!
//! Fetching source text, splitting it into sections and running the script
//! section all live outside the runtime. These traits are the only thing it
//! knows about them. Async methods return [`LocalBoxFuture`]s: everything runs
//! on one thread and the values involved are not `Send`.

use std::fmt;
use std::rc::Rc;

use futures_util::future::{self, LocalBoxFuture};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::registry::ProvideContext;
use super::resolve::resolve_url;
use crate::dom::TemplateNode;
use crate::error::{EvalError, ParseError, ProviderError, ScriptError};
use crate::reactive::Signal;
use crate::scope::{Binding, Callback};
use crate::value::Value;

/// Supplies raw component and module source.
pub trait SourceProvider {
    fn get_text<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, ProviderError>>;
}

/// The sections of a component source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSections {
    pub template: Vec<TemplateNode>,
    pub script: String,
    pub style: Option<String>,
}

/// Splits component source into its sections.
pub trait StructuralParser {
    fn parse(&self, text: &str) -> Result<ComponentSections, ParseError>;
}

impl<F> StructuralParser for F
where
    F: Fn(&str) -> Result<ComponentSections, ParseError>,
{
    fn parse(&self, text: &str) -> Result<ComponentSections, ParseError> {
        self(text)
    }
}

/// Lets a script load further modules.
pub trait ImportCapability {
    fn import<'a>(&'a self, specifier: &'a str) -> LocalBoxFuture<'a, Result<String, ProviderError>>;
}

/// Runs a component's script section.
pub trait ScriptExecutor {
    fn execute<'a>(
        &'a self,
        script: &'a str,
        env: ScriptEnv,
    ) -> LocalBoxFuture<'a, Result<ScriptOutput, ScriptError>>;
}

/// What a script gets to work with.
#[derive(Clone)]
pub struct ScriptEnv {
    pub props: Props,
    pub emit: Emitter,
    pub imports: Rc<dyn ImportCapability>,
    pub context: ProvideContext,
}

pub type MountedHook = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<(), ScriptError>>>;
pub type UnmountedHook = Box<dyn FnOnce() -> Result<(), ScriptError>>;

/// What a script hands back to the runtime.
#[derive(Default)]
pub struct ScriptOutput {
    /// Names visible to the component's template.
    pub bindings: IndexMap<String, Binding>,
    /// Tag name to source reference for child components.
    pub imports: IndexMap<String, String>,
    pub on_mounted: Vec<MountedHook>,
    pub on_unmounted: Vec<UnmountedHook>,
}

impl ScriptOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, binding: impl Into<Binding>) -> Self {
        self.bindings.insert(name.into(), binding.into());
        self
    }

    pub fn import(mut self, tag: impl Into<String>, source: impl Into<String>) -> Self {
        self.imports.insert(tag.into(), source.into());
        self
    }

    pub fn on_mounted<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> LocalBoxFuture<'static, Result<(), ScriptError>> + 'static,
    {
        self.on_mounted.push(Box::new(hook));
        self
    }

    pub fn on_unmounted<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Result<(), ScriptError> + 'static,
    {
        self.on_unmounted.push(Box::new(hook));
        self
    }
}

impl fmt::Debug for ScriptOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptOutput")
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("imports", &self.imports)
            .field("on_mounted", &self.on_mounted.len())
            .field("on_unmounted", &self.on_unmounted.len())
            .finish()
    }
}

/// A component's props. Every prop is a cell; static props simply never
/// change.
#[derive(Clone, Default)]
pub struct Props {
    values: Rc<IndexMap<String, Signal<Value>>>,
}

impl Props {
    pub fn new(values: IndexMap<String, Signal<Value>>) -> Self {
        Self {
            values: Rc::new(values),
        }
    }

    /// Read a prop, tracking it.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(Signal::get)
    }

    pub fn signal(&self, name: &str) -> Option<&Signal<Value>> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Signal<Value>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All props as one object, tracking every read.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(name, signal)| (name.clone(), signal.get()))
                .collect(),
        )
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(k, v)| (k, v.get_untracked())))
            .finish()
    }
}

/// Delivers a component's events to the handlers its parent bound.
#[derive(Clone)]
pub struct Emitter {
    handlers: Rc<IndexMap<String, Callback>>,
    component: Rc<str>,
}

impl Emitter {
    pub fn new(component: &str, handlers: IndexMap<String, Callback>) -> Self {
        Self {
            handlers: Rc::new(handlers),
            component: component.into(),
        }
    }

    /// Call the parent's handler for `event`, if it bound one.
    pub fn emit(&self, event: &str, payload: Value) -> Result<Value, EvalError> {
        match self.handlers.get(event) {
            Some(handler) => handler.call(&[payload]),
            None => {
                tracing::trace!(component = %self.component, event, "no handler for emitted event");
                Ok(Value::Null)
            }
        }
    }

    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// `$emit(event, payload)` for templates.
    pub fn to_callback(&self) -> Callback {
        let emitter = self.clone();
        Callback::new(move |args| {
            let event = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| EvalError::Type("$emit expects an event name".into()))?;
            emitter.emit(event, args.get(1).cloned().unwrap_or(Value::Null))
        })
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("component", &self.component)
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Source held in memory, keyed by URL.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: IndexMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(url, text);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, text: impl Into<String>) {
        self.files.insert(url.into(), text.into());
    }
}

impl SourceProvider for MemorySource {
    fn get_text<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<String, ProviderError>> {
        let result = self
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(url.to_string()));
        Box::pin(future::ready(result))
    }
}

/// Resolves import specifiers against the importing component's URL and
/// fetches them through the source provider.
pub struct ModuleImporter {
    provider: Rc<dyn SourceProvider>,
    base: Option<String>,
}

impl ModuleImporter {
    pub fn new(provider: Rc<dyn SourceProvider>, base: Option<String>) -> Self {
        Self { provider, base }
    }
}

impl ImportCapability for ModuleImporter {
    fn import<'a>(&'a self, specifier: &'a str) -> LocalBoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let url = resolve_url(self.base.as_deref(), specifier);
            tracing::debug!(%url, "importing module");
            self.provider.get_text(&url).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::cell::RefCell;

    #[test]
    fn memory_source_serves_known_urls() {
        let source = MemorySource::new().with("/app.html", "<p></p>");
        assert_eq!(
            source.get_text("/app.html").now_or_never().unwrap().unwrap(),
            "<p></p>"
        );
        assert_eq!(
            source.get_text("/nope.html").now_or_never().unwrap(),
            Err(ProviderError::NotFound("/nope.html".into()))
        );
    }

    #[test]
    fn importer_resolves_relative_to_base() {
        let source: Rc<dyn SourceProvider> =
            Rc::new(MemorySource::new().with("/lib/util.js", "export {}"));
        let importer = ModuleImporter::new(source, Some("/lib/widgets/card.html".into()));
        let text = importer.import("../util.js").now_or_never().unwrap();
        assert_eq!(text.unwrap(), "export {}");
    }

    #[test]
    fn emitter_routes_to_bound_handlers() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        let mut handlers = IndexMap::new();
        handlers.insert(
            "save".to_string(),
            Callback::new(move |args| {
                sink.borrow_mut().push(args[0].clone());
                Ok(Value::Null)
            }),
        );
        let emitter = Emitter::new("editor", handlers);

        emitter.emit("save", json!({"id": 1})).unwrap();
        emitter.emit("close", json!(null)).unwrap();
        emitter
            .to_callback()
            .call(&[json!("save"), json!(2)])
            .unwrap();

        assert_eq!(*received.borrow(), vec![json!({"id": 1}), json!(2)]);
        assert!(emitter.handles("save"));
        assert!(emitter.to_callback().call(&[json!(3)]).is_err());
    }

    #[test]
    fn props_snapshot_as_object() {
        let mut values = IndexMap::new();
        values.insert("title".to_string(), Signal::new(json!("Hi")));
        values.insert("count".to_string(), Signal::new(json!(2)));
        let props = Props::new(values);
        assert_eq!(props.to_value(), json!({"title": "Hi", "count": 2}));
        assert_eq!(props.get("count"), Some(json!(2)));
        assert_eq!(props.len(), 2);
    }
}
