//! Text interpolation.
//!
//! `Hello {{ name }}, you have {{ count }} messages` becomes five text
//! nodes: three static ones and two placeholders, each placeholder driven by
//! its own effect. A failing expression only blanks its own placeholder.

use super::{report, CompileContext};
use crate::dom::NodeId;
use crate::runtime::Runtime;
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Static(&'a str),
    Expression(&'a str),
}

/// Split `text` on interpolation markers. An unclosed marker is kept as
/// static text.
pub(crate) fn split<'a>(text: &'a str, open: &str, close: &str) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Static(&rest[..start]));
        }
        segments.push(Segment::Expression(after_open[..end].trim()));
        rest = &after_open[end + close.len()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Static(rest));
    }
    segments
}

pub(super) fn compile_text(rt: &Runtime, node: NodeId, ctx: &CompileContext) -> NodeId {
    let doc = rt.document();
    let Some(text) = doc.text(node) else {
        return node;
    };
    let config = rt.config();
    let segments = split(&text, &config.interpolation_open, &config.interpolation_close);
    if !segments
        .iter()
        .any(|segment| matches!(segment, Segment::Expression(_)))
    {
        return node;
    }

    if doc.parent(node).is_none() {
        compile_detached(rt, node, &segments, ctx);
        return node;
    }

    let mut nodes = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Static(text) => nodes.push(doc.create_text(text)),
            Segment::Expression(expression) => {
                let placeholder = doc.create_text("");
                let (rt2, ctx, expression) = (rt.clone(), ctx.clone(), expression.to_string());
                rt.bind_effect(placeholder, move || {
                    let text = match rt2.evaluate(&expression, &ctx.scope) {
                        Ok(value) => value::display(&value),
                        Err(error) => {
                            report(&ctx, &expression, &error);
                            rt2.config().eval_error_marker.clone()
                        }
                    };
                    rt2.document().set_text(placeholder, text);
                });
                nodes.push(placeholder);
            }
        }
    }

    doc.replace_with(node, &nodes);
    doc.release(node);
    nodes[0]
}

/// A text node with no parent cannot be split; one effect renders the whole
/// text, still falling back per expression.
fn compile_detached(rt: &Runtime, node: NodeId, segments: &[Segment<'_>], ctx: &CompileContext) {
    let parts: Vec<(bool, String)> = segments
        .iter()
        .map(|segment| match segment {
            Segment::Static(text) => (false, text.to_string()),
            Segment::Expression(expression) => (true, expression.to_string()),
        })
        .collect();
    let (rt2, ctx) = (rt.clone(), ctx.clone());
    rt.bind_effect(node, move || {
        let mut text = String::new();
        for (is_expression, part) in &parts {
            if !is_expression {
                text.push_str(part);
                continue;
            }
            match rt2.evaluate(part, &ctx.scope) {
                Ok(value) => text.push_str(&value::display(&value)),
                Err(error) => {
                    report(&ctx, part, &error);
                    text.push_str(&rt2.config().eval_error_marker);
                }
            }
        }
        rt2.document().set_text(node, text);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_static_and_expression_segments() {
        assert_eq!(
            split("Hi {{ name }}!", "{{", "}}"),
            vec![
                Segment::Static("Hi "),
                Segment::Expression("name"),
                Segment::Static("!")
            ]
        );
        assert_eq!(
            split("{{a}}{{b}}", "{{", "}}"),
            vec![Segment::Expression("a"), Segment::Expression("b")]
        );
    }

    #[test]
    fn unclosed_marker_stays_static() {
        assert_eq!(
            split("a {{ b", "{{", "}}"),
            vec![Segment::Static("a {{ b")]
        );
        assert_eq!(split("plain", "{{", "}}"), vec![Segment::Static("plain")]);
    }
}
