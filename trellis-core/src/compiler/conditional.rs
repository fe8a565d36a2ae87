//! Conditional mount (`v-if`).
//!
//! The element is swapped for an anchor and kept aside as a template. The
//! first time the guard turns truthy the template is compiled; from then on
//! the same compiled node is inserted into and detached from the anchor's
//! region, never compiled again. Its bindings keep running while detached.

use std::cell::RefCell;
use std::rc::Rc;

use super::CompileContext;
use crate::dom::NodeId;
use crate::lifecycle::Lifecycle;
use crate::reactive::untracked;
use crate::runtime::Runtime;
use crate::value::{self, Value};

struct ConditionalBlock {
    anchor: NodeId,
    template: NodeId,
    rendered: Option<NodeId>,
    shown: bool,
}

impl ConditionalBlock {
    fn show(&mut self, rt: &Runtime, ctx: &CompileContext) {
        if self.shown {
            return;
        }
        let node = match self.rendered {
            Some(node) => node,
            None => {
                let node = untracked(|| rt.compile_node(self.template, ctx));
                self.rendered = Some(node);
                node
            }
        };
        rt.document().push_region(self.anchor, node);
        self.shown = true;
    }

    fn hide(&mut self, rt: &Runtime) {
        if !self.shown {
            return;
        }
        if let Some(node) = self.rendered {
            let doc = rt.document();
            doc.remove_from_region(self.anchor, node);
            doc.detach(node);
        }
        self.shown = false;
    }

    /// A shown node is cleaned with the anchor's region; a hidden one is not
    /// in the tree, so it is cleaned here.
    fn dispose(&mut self, lifecycle: &Lifecycle, rt: &Runtime) {
        match self.rendered.take() {
            Some(node) if !self.shown => {
                lifecycle.cleanup_and_remove(node);
            }
            Some(_) => {}
            None => rt.document().release(self.template),
        }
    }
}

pub(super) fn compile(rt: &Runtime, node: NodeId, expression: &str, ctx: &CompileContext) -> NodeId {
    let doc = rt.document();
    let anchor = doc.create_comment("if");
    doc.replace_with(node, &[anchor]);

    let block = Rc::new(RefCell::new(ConditionalBlock {
        anchor,
        template: node,
        rendered: None,
        shown: false,
    }));

    let (rt2, ctx, expression, state) = (rt.clone(), ctx.clone(), expression.to_string(), Rc::clone(&block));
    rt.bind_effect(anchor, move || {
        let visible = value::truthy(&rt2.evaluate_or(&expression, &ctx, Value::Bool(false)));
        let mut block = state.borrow_mut();
        if visible {
            block.show(&rt2, &ctx);
        } else {
            block.hide(&rt2);
        }
    });

    let (rt2, lifecycle) = (rt.clone(), rt.lifecycle().clone());
    rt.lifecycle()
        .register(anchor, move || block.borrow_mut().dispose(&lifecycle, &rt2));

    anchor
}
