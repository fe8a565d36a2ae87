//! Attribute directives on plain elements.
//!
//! Each directive attribute is removed from the element and replaced by the
//! effect or listener that implements it:
//!
//! | attribute                 | effect                                   |
//! |---------------------------|------------------------------------------|
//! | `:name` / `v-bind:name`   | sync an attribute or property            |
//! | `@event` / `v-on:event`   | listener evaluating the handler          |
//! | `v-model`                 | property sync plus a write-back listener |
//! | `v-show`                  | toggle the hidden flag                   |
//! | `v-html`                  | set raw markup                           |
//! | `v-<name>`                | registered custom directive              |

use std::cell::RefCell;

use super::{event_name, report, CompileContext, Directive};
use crate::component::DirectiveBinding;
use crate::dom::{Document, NodeId};
use crate::reactive::untracked;
use crate::runtime::Runtime;
use crate::scope::Callback;
use crate::value::{self, Value};

/// Compile the directive attributes of `node`. Returns `true` when `v-html`
/// owns the element's content, in which case its children are not compiled.
pub(super) fn compile(rt: &Runtime, node: NodeId, ctx: &CompileContext) -> bool {
    let doc = rt.document();
    let mut raw_markup = false;

    for (name, expression) in doc.attributes(node) {
        let Some(directive) = Directive::classify(rt.config(), &name) else {
            continue;
        };
        doc.remove_attribute(node, &name);

        match directive {
            Directive::Bind(attribute) => bind(rt, node, &attribute, expression, ctx),
            Directive::On(event) => {
                let handler = handler(rt, &expression, ctx);
                doc.add_event_listener(node, event_name(&event), move |event| {
                    let _ = handler.call(&[event.detail.clone()]);
                });
            }
            Directive::Model => model(rt, node, expression, ctx),
            Directive::Show => {
                let (rt2, ctx) = (rt.clone(), ctx.clone());
                rt.bind_effect(node, move || {
                    let visible = value::truthy(&rt2.evaluate_or(&expression, &ctx, Value::Bool(false)));
                    rt2.document().set_hidden(node, !visible);
                });
            }
            Directive::Html => {
                raw_markup = true;
                let (rt2, ctx) = (rt.clone(), ctx.clone());
                rt.bind_effect(node, move || {
                    let markup = value::display(&rt2.evaluate_or(&expression, &ctx, Value::Null));
                    rt2.document().set_inner_html(node, markup);
                });
            }
            Directive::Custom { name, arg } => custom(rt, node, &name, arg, expression, ctx),
            // Keys only mean something to lists; the structural directives
            // never reach this point.
            Directive::Key | Directive::If | Directive::For => {}
        }
    }

    raw_markup
}

fn bind(rt: &Runtime, node: NodeId, attribute: &str, expression: String, ctx: &CompileContext) {
    let doc = rt.document();
    let as_property = rt.config().is_property(attribute);
    let static_part = match attribute {
        "class" | "style" => doc.attribute(node, attribute),
        _ => None,
    };
    let (rt2, ctx, attribute) = (rt.clone(), ctx.clone(), attribute.to_string());

    rt.bind_effect(node, move || {
        let value = rt2.evaluate_or(&expression, &ctx, Value::Null);
        let doc = rt2.document();
        if as_property {
            doc.set_property(node, &attribute, value);
            return;
        }
        let dynamic = attribute_text(&attribute, &value);
        let merged = match (&static_part, dynamic) {
            (Some(fixed), Some(dynamic)) if !dynamic.is_empty() => Some(format!("{fixed} {dynamic}")),
            (Some(fixed), _) => Some(fixed.clone()),
            (None, dynamic) => dynamic,
        };
        match merged {
            Some(text) => doc.set_attribute(node, &attribute, text),
            None => {
                doc.remove_attribute(node, &attribute);
            }
        }
    });
}

/// Attribute text for a bound value. `None` removes the attribute.
fn attribute_text(attribute: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        _ => Some(match attribute {
            "class" => value::class_list(value).unwrap_or_else(|| value::display(value)),
            "style" => value::style_text(value).unwrap_or_else(|| value::display(value)),
            _ => value::display(value),
        }),
    }
}

/// Build the callable behind an event binding.
///
/// A bare name bound to a function is called with the event payload.
/// Anything else is evaluated as an expression in a child scope defining
/// `$event`. Handlers never subscribe the effect they happen to run in.
pub(super) fn handler(rt: &Runtime, expression: &str, ctx: &CompileContext) -> Callback {
    let (rt, ctx, expression) = (rt.clone(), ctx.clone(), expression.trim().to_string());
    let bare_name = !expression.is_empty()
        && expression
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$');

    Callback::new(move |args| {
        let payload = args.first().cloned().unwrap_or(Value::Null);
        let result = untracked(|| {
            if bare_name {
                if let Some(function) = ctx.scope.function(&expression) {
                    return function.call(&[payload]);
                }
            }
            let scope = ctx.scope.child();
            scope.define("$event", payload);
            rt.evaluate(&expression, &scope)
        });
        if let Err(error) = &result {
            report(&ctx, &expression, error);
        }
        result
    })
}

fn model(rt: &Runtime, node: NodeId, path: String, ctx: &CompileContext) {
    let doc = rt.document();
    let tag = doc.tag(node).unwrap_or_default();
    let checkbox = tag == "input" && doc.attribute(node, "type").as_deref() == Some("checkbox");
    let (property, event) = match (checkbox, tag.as_str()) {
        (true, _) => ("checked", "change"),
        (false, "select") => ("value", "change"),
        _ => ("value", "input"),
    };
    let path = path.trim().to_string();

    let (rt2, read_ctx, read_path) = (rt.clone(), ctx.clone(), path.clone());
    rt.bind_effect(node, move || {
        let current = rt2.evaluate_or(&read_path, &read_ctx, Value::Null);
        let synced = if checkbox {
            Value::Bool(value::truthy(&current))
        } else {
            current
        };
        rt2.document().set_property(node, property, synced);
    });

    let (doc2, ctx) = (doc.clone(), ctx.clone());
    doc.add_event_listener(node, event, move |event| {
        let raw = doc2.property(event.target, property).unwrap_or(Value::Null);
        let written = if checkbox {
            Value::Bool(value::truthy(&raw))
        } else {
            raw
        };
        if let Err(error) = untracked(|| ctx.scope.assign(&path, written)) {
            report(&ctx, &path, &error);
        }
    });
}

fn custom(
    rt: &Runtime,
    node: NodeId,
    name: &str,
    arg: Option<String>,
    expression: String,
    ctx: &CompileContext,
) {
    let Some(directive) = rt.directives().get(name) else {
        tracing::warn!(component = %ctx.component, directive = name, "unknown directive");
        return;
    };

    let previous: RefCell<Option<Value>> = RefCell::new(None);
    let (rt2, ctx, run_directive) = (rt.clone(), ctx.clone(), directive.clone());
    rt.bind_effect(node, move || {
        let value = rt2.evaluate_or(&expression, &ctx, Value::Null);
        let binding = DirectiveBinding {
            old_value: previous.replace(Some(value.clone())),
            value,
            arg: arg.clone(),
            expression: expression.clone(),
        };
        untracked(|| run_directive.update(rt2.document(), node, &binding));
    });

    let doc: Document = rt.document().clone();
    rt.lifecycle().register(node, move || directive.unmount(&doc, node));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attribute_text_rules() {
        assert_eq!(attribute_text("title", &json!(null)), None);
        assert_eq!(attribute_text("disabled", &json!(false)), None);
        assert_eq!(attribute_text("hidden", &json!(true)).as_deref(), Some(""));
        assert_eq!(attribute_text("title", &json!(3)).as_deref(), Some("3"));
        assert_eq!(
            attribute_text("class", &json!({"on": true, "off": false})).as_deref(),
            Some("on")
        );
        assert_eq!(
            attribute_text("style", &json!({"color": "red"})).as_deref(),
            Some("color: red;")
        );
    }
}
