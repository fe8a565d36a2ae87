//! Node Compiler
//!
//! Walks a host subtree once and wires every directive in it to effects.
//! After compilation the compiler holds no state: each directive is owned by
//! the effects and handler objects it created, and those are torn down
//! through the [`Lifecycle`](crate::Lifecycle) when their nodes leave the
//! tree.
//!
//! # Dispatch
//!
//! For each element, the first matching branch handles it and nothing else
//! looks at the element again:
//!
//! 1. `v-if` together with `v-for` is a structural error.
//! 2. `v-if`: conditional mount ([`conditional`]).
//! 3. `v-for`: keyed list ([`list`]).
//! 4. A component tag: a registered renderer, an imported tag, or a
//!    hyphenated tag that is not reserved ([`component`]).
//! 5. `<slot>` ([`slot`]).
//! 6. Otherwise attribute directives ([`attributes`]), then the children.
//!
//! Structural directives are looked at before the component check so that
//! `<todo-item v-for="...">` repeats the component rather than passing the
//! directive along as a prop.
//!
//! Text nodes go through [`interpolate`].

mod attributes;
mod component;
mod conditional;
mod interpolate;
mod list;
mod slot;

use std::rc::Rc;

use indexmap::IndexMap;

use crate::component::{ProvideContext, ResolutionContext};
use crate::config::RuntimeConfig;
use crate::dom::{NodeId, NodeKind};
use crate::error::{DirectiveError, EvalError};
use crate::reactive::Effect;
use crate::runtime::Runtime;
use crate::scope::Scope;
use crate::value::Value;

pub use list::ListExpression;

/// Slot name to a fragment holding that slot's compiled content.
pub type Slots = IndexMap<String, NodeId>;

/// Everything a subtree is compiled against.
#[derive(Clone, Debug)]
pub struct CompileContext {
    pub scope: Scope,
    /// Component name used in log records.
    pub component: Rc<str>,
    pub resolution: Rc<ResolutionContext>,
    pub provide: ProvideContext,
    pub slots: Rc<Slots>,
}

impl CompileContext {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            component: Rc::from("root"),
            resolution: Rc::new(ResolutionContext::default()),
            provide: ProvideContext::new(),
            slots: Rc::new(Slots::new()),
        }
    }

    /// Same context, different scope.
    pub fn with_scope(&self, scope: Scope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }

    pub fn component(mut self, name: &str) -> Self {
        self.component = Rc::from(name);
        self
    }

    pub fn resolution(mut self, resolution: ResolutionContext) -> Self {
        self.resolution = Rc::new(resolution);
        self
    }

    pub fn provide(mut self, provide: ProvideContext) -> Self {
        self.provide = provide;
        self
    }

    pub fn slots(mut self, slots: Slots) -> Self {
        self.slots = Rc::new(slots);
        self
    }
}

/// A directive attribute, recognized by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Directive {
    If,
    For,
    Key,
    Model,
    Show,
    Html,
    Bind(String),
    On(String),
    Custom { name: String, arg: Option<String> },
}

impl Directive {
    pub(crate) fn classify(config: &RuntimeConfig, attribute: &str) -> Option<Self> {
        if let Some(name) = attribute.strip_prefix(config.bind_prefix.as_str()) {
            return Some(Self::bind(name));
        }
        if let Some(event) = attribute.strip_prefix(config.event_prefix.as_str()) {
            return Some(Self::On(event.to_string()));
        }
        let rest = attribute.strip_prefix(config.directive_prefix.as_str())?;
        Some(match rest {
            "if" => Self::If,
            "for" => Self::For,
            "model" => Self::Model,
            "show" => Self::Show,
            "html" => Self::Html,
            _ => {
                if let Some(name) = rest.strip_prefix("bind:") {
                    return Some(Self::bind(name));
                }
                if let Some(event) = rest.strip_prefix("on:") {
                    return Some(Self::On(event.to_string()));
                }
                match rest.split_once(':') {
                    Some((name, arg)) => Self::Custom {
                        name: name.to_string(),
                        arg: Some(arg.to_string()),
                    },
                    None => Self::Custom {
                        name: rest.to_string(),
                        arg: None,
                    },
                }
            }
        })
    }

    fn bind(name: &str) -> Self {
        if name == "key" {
            Self::Key
        } else {
            Self::Bind(name.to_string())
        }
    }
}

/// Event name without modifiers (`click.prevent` -> `click`).
pub(crate) fn event_name(raw: &str) -> &str {
    raw.split('.').next().unwrap_or(raw)
}

impl Runtime {
    /// Compile `node` against `ctx`, wiring its directives to effects.
    ///
    /// Returns the node that now stands where `node` stood: `node` itself,
    /// or the anchor or marker that replaced it.
    pub fn compile_node(&self, node: NodeId, ctx: &CompileContext) -> NodeId {
        match self.document().kind(node) {
            Some(NodeKind::Element) => self.compile_element(node, ctx),
            Some(NodeKind::Text) => interpolate::compile_text(self, node, ctx),
            Some(NodeKind::Fragment) => {
                self.compile_children(node, ctx);
                node
            }
            Some(NodeKind::Comment) | None => node,
        }
    }

    pub(crate) fn compile_children(&self, parent: NodeId, ctx: &CompileContext) {
        for child in self.document().children(parent) {
            self.compile_node(child, ctx);
        }
    }

    fn compile_element(&self, node: NodeId, ctx: &CompileContext) -> NodeId {
        let doc = self.document();
        let Some(tag) = doc.tag(node) else {
            return node;
        };

        let mut guard = None;
        let mut repeat = None;
        for (name, value) in doc.attributes(node) {
            match Directive::classify(self.config(), &name) {
                Some(Directive::If) => guard = Some((name, value)),
                Some(Directive::For) => repeat = Some((name, value)),
                _ => {}
            }
        }

        match (guard, repeat) {
            (Some((first, _)), Some((second, _))) => {
                self.structural_error(node, DirectiveError::Conflicting { first, second }, ctx)
            }
            (Some((name, expression)), None) => {
                doc.remove_attribute(node, &name);
                conditional::compile(self, node, &expression, ctx)
            }
            (None, Some((name, expression))) => {
                doc.remove_attribute(node, &name);
                list::compile(self, node, &expression, ctx)
            }
            (None, None) if self.is_component_tag(&tag, ctx) => {
                component::compile(self, node, &tag, ctx)
            }
            (None, None) if tag == "slot" => slot::compile(self, node, ctx),
            (None, None) => {
                let raw_markup = attributes::compile(self, node, ctx);
                if !raw_markup {
                    self.compile_children(node, ctx);
                }
                node
            }
        }
    }

    fn is_component_tag(&self, tag: &str, ctx: &CompileContext) -> bool {
        self.components().contains(tag)
            || ctx.resolution.imports(tag)
            || (tag.contains('-') && !self.config().is_reserved(tag))
    }

    /// Replace `node` with an inline marker describing `error`.
    pub(crate) fn structural_error(
        &self,
        node: NodeId,
        error: DirectiveError,
        ctx: &CompileContext,
    ) -> NodeId {
        tracing::warn!(component = %ctx.component, %error, "structural directive error");
        let marker = self.error_marker(&error.to_string());
        self.document().replace_with(node, &[marker]);
        self.document().release(node);
        marker
    }

    /// A detached element carrying `message` and the error class.
    pub(crate) fn error_marker(&self, message: &str) -> NodeId {
        let doc = self.document();
        let marker = doc.create_element("span");
        doc.set_attribute(marker, "class", self.config().structural_error_class.as_str());
        let text = doc.create_text(message);
        doc.append_child(marker, text);
        marker
    }

    /// Evaluate against `ctx`'s scope, logging failures and substituting
    /// `fallback`.
    pub(crate) fn evaluate_or(&self, expression: &str, ctx: &CompileContext, fallback: Value) -> Value {
        match self.evaluate(expression, &ctx.scope) {
            Ok(value) => value,
            Err(error) => {
                report(ctx, expression, &error);
                fallback
            }
        }
    }

    /// Create an effect that lives as long as `owner`.
    pub(crate) fn bind_effect(&self, owner: NodeId, run: impl FnMut() + 'static) -> Effect {
        let effect = Effect::new(run);
        let handle = effect.clone();
        self.lifecycle().register(owner, move || handle.stop());
        effect
    }
}

pub(crate) fn report(ctx: &CompileContext, expression: &str, error: &EvalError) {
    tracing::warn!(
        component = %ctx.component,
        expression,
        %error,
        "binding evaluation failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(name: &str) -> Option<Directive> {
        Directive::classify(&RuntimeConfig::default(), name)
    }

    #[test]
    fn recognizes_directive_attributes() {
        assert_eq!(classify("v-if"), Some(Directive::If));
        assert_eq!(classify(":title"), Some(Directive::Bind("title".into())));
        assert_eq!(classify("v-bind:title"), Some(Directive::Bind("title".into())));
        assert_eq!(classify(":key"), Some(Directive::Key));
        assert_eq!(classify("@click.prevent"), Some(Directive::On("click.prevent".into())));
        assert_eq!(classify("v-on:submit"), Some(Directive::On("submit".into())));
        assert_eq!(
            classify("v-tooltip:top"),
            Some(Directive::Custom {
                name: "tooltip".into(),
                arg: Some("top".into())
            })
        );
        assert_eq!(classify("class"), None);
        assert_eq!(event_name("click.prevent.stop"), "click");
    }
}
