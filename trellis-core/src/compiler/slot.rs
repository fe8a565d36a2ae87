//! `<slot>` outlets inside a component template.
//!
//! The parent compiled its slot content against its own scope before the
//! child was even loaded; the outlet only moves those nodes into place. With
//! no content for the slot, the outlet's own children are compiled against
//! the child's scope as fallback.

use super::CompileContext;
use crate::dom::NodeId;
use crate::runtime::Runtime;

pub(super) fn compile(rt: &Runtime, node: NodeId, ctx: &CompileContext) -> NodeId {
    let doc = rt.document();
    let name = doc
        .attribute(node, "name")
        .unwrap_or_else(|| "default".to_string());

    let provided = ctx
        .slots
        .get(&name)
        .copied()
        .filter(|holder| !doc.children(*holder).is_empty());
    let content = match provided {
        Some(holder) => doc.region_roots(holder),
        None => {
            rt.compile_children(node, ctx);
            doc.region_roots(node)
        }
    };

    let anchor = doc.create_comment(format!("slot: {name}"));
    doc.replace_with(node, &[anchor]);
    for child in content {
        doc.push_region(anchor, child);
    }
    doc.release(node);
    anchor
}
