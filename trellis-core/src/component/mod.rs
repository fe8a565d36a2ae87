//! Components
//!
//! A component is a source document split by a [`StructuralParser`] into a
//! template, a script and an optional stylesheet. Mounting one runs the
//! script through a [`ScriptExecutor`], layers its bindings over the props,
//! compiles the template and inserts the result at a target.
//!
//! # Mount order
//!
//! 1. Resolve the source reference and fetch it through the
//!    [`SourceProvider`].
//! 2. Parse it and register the stylesheet.
//! 3. Run the script and wait for it.
//! 4. Build the scope: props, `$emit` and `$props` underneath, the script's
//!    bindings on top.
//! 5. Materialize and compile the template, then insert it.
//! 6. Register the teardown, then run the mounted hooks and flush
//!    microtasks.
//!
//! A failure in steps 1 to 3 puts an inline error marker at the target and
//! is returned to the caller. Nothing is inserted if the target left the
//! tree while the source was loading.

mod provider;
mod registry;
mod resolve;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

pub use provider::{
    ComponentSections, Emitter, ImportCapability, MemorySource, ModuleImporter, MountedHook, Props,
    ScriptEnv, ScriptExecutor, ScriptOutput, SourceProvider, StructuralParser, UnmountedHook,
};
pub use registry::{
    ComponentRegistry, CustomDirective, DirectiveBinding, DirectiveRegistry, ProvideContext,
    RenderRequest, RendererCapability,
};
pub use resolve::{resolve_url, ResolutionContext};

use crate::compiler::{CompileContext, Slots};
use crate::dom::{NodeId, TemplateNode};
use crate::error::{MountError, ParseError, ScriptError};
use crate::reactive::{flush_microtasks, Effect, Signal};
use crate::runtime::Runtime;
use crate::scope::{Binding, Callback, Scope};
use crate::value::Value;

/// Where a mounted component goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountTarget {
    /// As the last child of the node.
    Append(NodeId),
    /// Into the region owned by an anchor node.
    After(NodeId),
}

impl MountTarget {
    pub fn node(&self) -> NodeId {
        match *self {
            MountTarget::Append(node) | MountTarget::After(node) => node,
        }
    }
}

/// Arguments to [`Runtime::mount_component`].
pub struct MountRequest {
    /// Source reference, resolved against `base_url`.
    pub source: String,
    pub target: MountTarget,
    pub props: IndexMap<String, Signal<Value>>,
    /// Event name to the parent's handler.
    pub handlers: IndexMap<String, Callback>,
    /// Name used in log records; derived from the URL when absent.
    pub name_hint: Option<String>,
    pub slots: Slots,
    pub base_url: Option<String>,
    pub context: ProvideContext,
}

impl MountRequest {
    pub fn new(source: impl Into<String>, target: MountTarget) -> Self {
        Self {
            source: source.into(),
            target,
            props: IndexMap::new(),
            handlers: IndexMap::new(),
            name_hint: None,
            slots: Slots::new(),
            base_url: None,
            context: ProvideContext::new(),
        }
    }

    /// A prop that never changes.
    pub fn prop(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.prop_signal(name, Signal::new(value.into()))
    }

    /// A prop the caller keeps writing to.
    pub fn prop_signal(mut self, name: impl Into<String>, signal: Signal<Value>) -> Self {
        self.props.insert(name.into(), signal);
        self
    }

    pub fn handler(mut self, event: impl Into<String>, handler: Callback) -> Self {
        self.handlers.insert(event.into(), handler);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name_hint = Some(name.into());
        self
    }

    pub fn slots(mut self, slots: Slots) -> Self {
        self.slots = slots;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn context(mut self, context: ProvideContext) -> Self {
        self.context = context;
        self
    }
}

impl fmt::Debug for MountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountRequest")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("name_hint", &self.name_hint)
            .field("slots", &self.slots)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// `todo-item` for `/app/todo-item.html`.
fn component_name(url: &str) -> String {
    let file = url.rsplit('/').next().unwrap_or(url);
    let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
    if stem.is_empty() {
        "component".to_string()
    } else {
        stem.to_ascii_lowercase()
    }
}

impl Runtime {
    /// Load, compile and insert a component.
    ///
    /// Returns the inserted root, or `None` when the template is empty.
    #[tracing::instrument(skip_all, fields(source = %request.source))]
    pub async fn mount_component(&self, request: MountRequest) -> Result<Option<NodeId>, MountError> {
        let MountRequest {
            source,
            target,
            props,
            handlers,
            name_hint,
            slots,
            base_url,
            context,
        } = request;
        let doc = self.document();
        let url = resolve_url(base_url.as_deref(), &source);
        let name = name_hint.unwrap_or_else(|| component_name(&url));
        if !doc.contains(target.node()) {
            return Err(MountError::InvalidTarget(target.node()));
        }

        let props = Props::new(props);
        let emit = Emitter::new(&name, handlers);
        let (template, output) = match self.load(&url, &name, &props, &emit, &context).await {
            Ok(loaded) => loaded,
            Err(error) => {
                tracing::warn!(component = %name, %url, %error, "component failed to load");
                self.render_mount_error(target, &error);
                return Err(error);
            }
        };
        if !doc.contains(target.node()) {
            tracing::debug!(component = %name, "mount target removed while loading");
            return Err(MountError::Cancelled);
        }

        let base = Scope::new();
        for (prop, signal) in props.iter() {
            base.define(prop, Binding::cell(signal));
        }
        base.define("$emit", emit.to_callback());
        let snapshot = Signal::new(Value::Null);
        let props_effect = {
            let (props, snapshot) = (props.clone(), snapshot.clone());
            Effect::new(move || {
                snapshot.set(props.to_value());
            })
        };
        base.define("$props", snapshot);
        let scope = base.child();
        scope.extend(output.bindings);

        let roots: Vec<&TemplateNode> = template.iter().filter(|node| !node.is_blank()).collect();
        let root = match roots.as_slice() {
            [] => {
                tracing::debug!(component = %name, "component template is empty");
                props_effect.stop();
                return Ok(None);
            }
            [single @ TemplateNode::Element { .. }] => doc.materialize(single),
            many => {
                let wrapper = doc.create_element("div");
                doc.set_attribute(wrapper, "data-component", name.as_str());
                for node in many {
                    let child = doc.materialize(node);
                    doc.append_child(wrapper, child);
                }
                wrapper
            }
        };

        let resolution = output
            .imports
            .into_iter()
            .fold(ResolutionContext::new(Some(url.clone())), |resolution, (tag, source)| {
                resolution.with_import(tag, source)
            });
        let ctx = CompileContext::new(scope)
            .component(&name)
            .resolution(resolution)
            .provide(context)
            .slots(slots);

        // Compiled inside a holder so a structural directive on the root has
        // a parent to put its anchor in.
        let holder = doc.create_fragment();
        doc.append_child(holder, root);
        self.compile_children(holder, &ctx);
        let Some(root) = doc.region_roots(holder).first().copied() else {
            doc.release(holder);
            props_effect.stop();
            return Ok(None);
        };
        match target {
            MountTarget::Append(parent) => doc.append_child(parent, root),
            MountTarget::After(anchor) => doc.push_region(anchor, root),
        }
        doc.release(holder);

        let unmounted = output.on_unmounted;
        let owner = name.clone();
        self.lifecycle().register(root, move || {
            props_effect.stop();
            for hook in unmounted {
                if let Err(error) = hook() {
                    tracing::warn!(component = %owner, %error, "unmounted hook failed");
                }
            }
        });

        for hook in output.on_mounted {
            if let Err(error) = hook().await {
                tracing::warn!(component = %name, %error, "mounted hook failed");
            }
        }
        flush_microtasks();
        tracing::debug!(component = %name, root = %root, "component mounted");
        Ok(Some(root))
    }

    async fn load(
        &self,
        url: &str,
        name: &str,
        props: &Props,
        emit: &Emitter,
        context: &ProvideContext,
    ) -> Result<(Vec<TemplateNode>, ScriptOutput), MountError> {
        let text = self.source_provider().get_text(url).await?;
        let parser = self
            .structural_parser()
            .ok_or_else(|| ParseError("no structural parser configured".into()))?;
        let sections = parser.parse(&text)?;
        tracing::debug!(component = name, roots = sections.template.len(), "component parsed");

        if let Some(style) = sections.style.as_deref().filter(|css| !css.trim().is_empty()) {
            self.document().add_stylesheet(url, style);
        }

        let output = if sections.script.trim().is_empty() {
            ScriptOutput::default()
        } else {
            let executor = self
                .script_executor()
                .ok_or_else(|| ScriptError("no script executor configured".into()))?;
            let env = ScriptEnv {
                props: props.clone(),
                emit: emit.clone(),
                imports: Rc::new(ModuleImporter::new(self.source_provider(), Some(url.to_string()))),
                context: context.clone(),
            };
            executor.execute(&sections.script, env).await?
        };
        Ok((sections.template, output))
    }

    fn render_mount_error(&self, target: MountTarget, error: &MountError) {
        let doc = self.document();
        if !doc.contains(target.node()) {
            return;
        }
        let marker = self.error_marker(&error.to_string());
        match target {
            MountTarget::Append(parent) => doc.append_child(parent, marker),
            MountTarget::After(anchor) => doc.push_region(anchor, marker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_components_after_their_file() {
        assert_eq!(component_name("/app/todo-item.html"), "todo-item");
        assert_eq!(component_name("https://cdn.example/ui/Card.vue"), "card");
        assert_eq!(component_name("/app/"), "component");
    }

    #[test]
    fn request_builder_collects_props_and_handlers() {
        let request = MountRequest::new("./card.html", MountTarget::Append(NodeId::from_index(0)))
            .prop("title", "Hello")
            .handler("close", Callback::new(|_| Ok(Value::Null)))
            .base_url("/app/main.html");
        assert_eq!(request.props["title"].get_untracked(), Value::from("Hello"));
        assert!(request.handlers.contains_key("close"));
        assert_eq!(request.name_hint, None);
    }
}
