//! Child component tags.
//!
//! The tag is taken apart on the parent side:
//!
//! - static attributes become constant props, bound attributes become props
//!   kept current by one effect each,
//! - event attributes become handlers the child reaches through its emitter,
//! - `v-model` becomes the `modelValue` prop plus an `update:modelValue`
//!   handler,
//! - children are grouped into named slots and compiled against the parent's
//!   scope.
//!
//! The tag is then replaced by an anchor. A tag backed by a renderer
//! capability is created on the spot; any other tag is loaded and mounted
//! asynchronously into the anchor's region. Tearing the anchor down aborts a
//! load that has not finished.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::{abortable, Aborted};
use indexmap::IndexMap;

use super::attributes::handler;
use super::{event_name, report, CompileContext, Directive, Slots};
use crate::component::{Emitter, MountRequest, MountTarget, Props, RenderRequest, RendererCapability};
use crate::dom::{NodeId, NodeKind};
use crate::error::MountError;
use crate::reactive::{untracked, Effect, Signal};
use crate::runtime::Runtime;
use crate::scope::Callback;
use crate::value::{self, Value};

pub(super) fn compile(rt: &Runtime, node: NodeId, tag: &str, ctx: &CompileContext) -> NodeId {
    let doc = rt.document();
    let mut props: IndexMap<String, Signal<Value>> = IndexMap::new();
    let mut handlers: IndexMap<String, Callback> = IndexMap::new();
    let mut effects: Vec<Effect> = Vec::new();
    let mut visibility = None;

    for (name, expression) in doc.attributes(node) {
        match Directive::classify(rt.config(), &name) {
            None => {
                props.insert(name, Signal::new(Value::String(expression)));
            }
            Some(Directive::Bind(prop)) => {
                let (signal, effect) = bound_prop(rt, expression, ctx);
                effects.push(effect);
                props.insert(prop, signal);
            }
            Some(Directive::On(event)) => {
                handlers.insert(event_name(&event).to_string(), handler(rt, &expression, ctx));
            }
            Some(Directive::Model) => {
                let path = expression.trim().to_string();
                let (signal, effect) = bound_prop(rt, path.clone(), ctx);
                effects.push(effect);
                props.insert("modelValue".into(), signal);
                handlers.insert("update:modelValue".into(), model_writer(path, ctx));
            }
            Some(Directive::Show) => visibility = Some(expression),
            Some(Directive::Key) => {}
            Some(other) => {
                tracing::warn!(component = %ctx.component, tag, directive = ?other, "directive is not supported on component tags");
            }
        }
    }

    let slots = collect_slots(rt, node, ctx);
    let anchor = doc.create_comment(format!("component: {tag}"));
    doc.replace_with(node, &[anchor]);
    doc.release(node);

    let holders: Vec<NodeId> = slots.values().copied().collect();
    let lifecycle = rt.lifecycle().clone();
    rt.lifecycle().register(anchor, move || {
        for effect in &effects {
            effect.stop();
        }
        for holder in holders {
            lifecycle.cleanup_and_remove(holder);
        }
    });

    match rt.components().get(tag) {
        Some(renderer) => {
            let (props, emit) = (Props::new(props), Emitter::new(tag, handlers));
            create_renderer(rt, anchor, tag, renderer, props, emit, visibility, ctx);
        }
        None => {
            if visibility.is_some() {
                tracing::warn!(component = %ctx.component, tag, "v-show is only supported on renderer-backed tags");
            }
            let source = ctx
                .resolution
                .resolve_component(tag, &rt.config().component_extension);
            let request = MountRequest {
                props,
                handlers,
                ..MountRequest::new(source, MountTarget::After(anchor))
            }
            .name(tag)
            .slots(slots)
            .context(ctx.provide.child());
            spawn_mount(rt, anchor, tag, request, ctx);
        }
    }
    anchor
}

fn bound_prop(rt: &Runtime, expression: String, ctx: &CompileContext) -> (Signal<Value>, Effect) {
    let signal = Signal::new(Value::Null);
    let (rt, ctx, target) = (rt.clone(), ctx.clone(), signal.clone());
    let effect = Effect::new(move || {
        target.set(rt.evaluate_or(&expression, &ctx, Value::Null));
    });
    (signal, effect)
}

fn model_writer(path: String, ctx: &CompileContext) -> Callback {
    let ctx = ctx.clone();
    Callback::new(move |args| {
        let written = args.first().cloned().unwrap_or(Value::Null);
        let result = untracked(|| ctx.scope.assign(&path, written));
        if let Err(error) = &result {
            report(&ctx, &path, error);
        }
        result.map(|()| Value::Null)
    })
}

/// Move the tag's children into one fragment per slot name and compile them
/// against the parent's context.
///
/// A child's `slot="name"` attribute picks its slot; everything else goes to
/// `default`. `<template slot="name">` contributes its children rather than
/// itself. Whitespace-only text is dropped.
fn collect_slots(rt: &Runtime, node: NodeId, ctx: &CompileContext) -> Slots {
    let doc = rt.document();
    let mut slots = Slots::new();

    for child in doc.children(node) {
        let (name, content) = match doc.kind(child) {
            Some(NodeKind::Element) => {
                let name = doc
                    .remove_attribute(child, "slot")
                    .unwrap_or_else(|| "default".to_string());
                if doc.tag(child).as_deref() == Some("template") {
                    (name, doc.children(child))
                } else {
                    (name, vec![child])
                }
            }
            Some(NodeKind::Text) => {
                if doc.text(child).is_some_and(|text| text.trim().is_empty()) {
                    continue;
                }
                ("default".to_string(), vec![child])
            }
            _ => continue,
        };
        let holder = *slots.entry(name).or_insert_with(|| doc.create_fragment());
        for node in content {
            doc.append_child(holder, node);
        }
    }

    for &holder in slots.values() {
        rt.compile_children(holder, ctx);
    }
    slots
}

#[allow(clippy::too_many_arguments)]
fn create_renderer(
    rt: &Runtime,
    anchor: NodeId,
    tag: &str,
    renderer: Rc<dyn RendererCapability>,
    props: Props,
    emit: Emitter,
    visibility: Option<String>,
    ctx: &CompileContext,
) {
    let request = RenderRequest {
        tag: tag.to_string(),
        anchor,
        document: rt.document().clone(),
        props,
        emit,
        context: ctx.provide.child(),
    };
    let handle: Box<dyn Any> = match renderer.create(&request) {
        Ok(handle) => handle,
        Err(error) => {
            tracing::warn!(component = %ctx.component, tag, %error, "renderer failed to create");
            let marker = rt.error_marker(&error.to_string());
            rt.document().push_region(anchor, marker);
            return;
        }
    };
    tracing::debug!(component = %ctx.component, tag, "renderer created");
    let handle = Rc::new(RefCell::new(Some(handle)));

    if let Some(expression) = visibility {
        let (rt2, ctx, renderer, handle) = (rt.clone(), ctx.clone(), Rc::clone(&renderer), Rc::clone(&handle));
        rt.bind_effect(anchor, move || {
            let visible = value::truthy(&rt2.evaluate_or(&expression, &ctx, Value::Bool(false)));
            if let Some(handle) = handle.borrow().as_ref() {
                untracked(|| renderer.set_visibility(handle.as_ref(), visible));
            }
        });
    }

    rt.lifecycle().register(anchor, move || {
        if let Some(handle) = handle.borrow_mut().take() {
            renderer.destroy(handle);
        }
    });
}

fn spawn_mount(rt: &Runtime, anchor: NodeId, tag: &str, request: MountRequest, ctx: &CompileContext) {
    let runtime = rt.clone();
    let (mount, abort) = abortable(async move { runtime.mount_component(request).await });
    rt.lifecycle().register(anchor, move || abort.abort());

    let (component, tag) = (Rc::clone(&ctx.component), tag.to_string());
    rt.spawn(async move {
        match mount.await {
            Ok(Ok(_)) => {}
            Ok(Err(MountError::Cancelled)) | Err(Aborted) => {
                tracing::debug!(component = %component, tag = %tag, "child component mount cancelled");
            }
            Ok(Err(error)) => {
                tracing::warn!(component = %component, tag = %tag, %error, "child component failed to mount");
            }
        }
    });
}
