//! Keyed list reconciliation (`v-for`).
//!
//! # Algorithm
//!
//! The list keeps a `key -> entry` map from its previous pass. On every run
//! of its effect:
//!
//! 1. Evaluate the iterable into an ordered sequence of `(item, index)`.
//! 2. Compute each item's key with the `:key` expression, evaluated in a
//!    throwaway scope exposing the item's fields under its aliases. Without
//!    a key expression the position is the key, so nodes are reused by
//!    position only.
//! 3. A key seen in the previous pass reuses that entry: its item and index
//!    cells are written in place, so its node and the effects inside it
//!    survive. Unknown keys get a fresh clone of the template, compiled once
//!    against a child scope holding new item and index cells.
//! 4. Entries whose keys were not visited are torn down and removed.
//! 5. Entries are moved into the new order, each directly after the previous
//!    one (the anchor for the first). A node is only moved when it is not
//!    already in place.
//!
//! The item alias writes through to the source collection: assigning to it,
//! or to a path below it, replaces `<iterable>.<index>` in the list's scope.
//! An iterable that is not a plain path, such as a range or a call, makes the
//! alias read-only.
//!
//! Duplicate keys within one pass follow last-write-wins: the later item
//! takes over the entry built for the earlier one and the entry sits at the
//! later position. The collision is logged.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{report, CompileContext, Directive};
use crate::dom::NodeId;
use crate::error::{DirectiveError, EvalError};
use crate::reactive::{untracked, Signal};
use crate::runtime::Runtime;
use crate::scope::{Binding, ListItem};
use crate::value::{self, Value};

/// A parsed `v-for` expression: `item in items` or `(item, index) in items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListExpression {
    pub item: String,
    pub index: Option<String>,
    pub iterable: String,
}

impl ListExpression {
    pub fn parse(expression: &str) -> Result<Self, DirectiveError> {
        let malformed = || DirectiveError::MalformedList(expression.to_string());

        let (aliases, iterable) = [" in ", " of "]
            .iter()
            .filter_map(|separator| expression.split_once(separator))
            .min_by_key(|(aliases, _)| aliases.len())
            .ok_or_else(malformed)?;
        let iterable = iterable.trim();
        if iterable.is_empty() {
            return Err(malformed());
        }

        let aliases = aliases.trim();
        let aliases = aliases
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
            .unwrap_or(aliases);
        let mut names = aliases.split(',').map(str::trim);
        let item = names.next().filter(|name| is_identifier(name)).ok_or_else(malformed)?;
        let index = match names.next() {
            Some(name) if is_identifier(name) => Some(name.to_string()),
            Some(_) => return Err(malformed()),
            None => None,
        };
        if names.next().is_some() {
            return Err(malformed());
        }

        Ok(Self {
            item: item.to_string(),
            index,
            iterable: iterable.to_string(),
        })
    }
}

/// `todos`, `state.rows` or `table.0.cells`: something an item can be written
/// back into.
fn is_assignable_path(expression: &str) -> bool {
    let mut segments = value::split_path(expression).into_iter();
    let is_index = |segment: &str| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
    segments.next().is_some_and(is_identifier)
        && segments.all(|segment| is_identifier(segment) || is_index(segment))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Turn an iterable value into `(item, index)` pairs.
///
/// Arrays index by position, objects by property name, a non-negative
/// integer `n` yields `1..=n`, and `null` yields nothing.
pub(crate) fn iterate(value: Value) -> Result<Vec<(Value, Value)>, EvalError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (item, Value::from(i)))
            .collect()),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, item)| (item, Value::String(key)))
            .collect()),
        Value::Number(n) => match n.as_u64() {
            Some(count) => Ok((0..count)
                .map(|i| (Value::from(i + 1), Value::from(i)))
                .collect()),
            None => Err(EvalError::Type(format!("cannot iterate over {n}"))),
        },
        other => Err(EvalError::Type(format!("cannot iterate over {other}"))),
    }
}

struct Entry {
    node: NodeId,
    item: Signal<Value>,
    index: Signal<Value>,
}

struct KeyedList {
    anchor: NodeId,
    template: NodeId,
    expression: ListExpression,
    key: Option<String>,
    entries: IndexMap<String, Entry>,
}

impl KeyedList {
    fn key_for(&self, rt: &Runtime, ctx: &CompileContext, item: &Value, index: &Value, position: usize) -> String {
        let Some(key_expression) = &self.key else {
            return position.to_string();
        };

        let fields = ctx.scope.child();
        if let Value::Object(map) = item {
            for (name, field) in map {
                fields.define(name.as_str(), field.clone());
            }
        }
        let aliases = fields.child();
        aliases.define(self.expression.item.as_str(), item.clone());
        if let Some(index_alias) = &self.expression.index {
            aliases.define(index_alias.as_str(), index.clone());
        }

        match rt.evaluate(key_expression, &aliases) {
            Ok(key) => value::key_string(&key),
            Err(error) => {
                report(ctx, key_expression, &error);
                position.to_string()
            }
        }
    }

    fn create_entry(&self, rt: &Runtime, ctx: &CompileContext, item: Value, index: Value) -> Entry {
        let doc = rt.document();
        let item = Signal::new(item);
        let index = Signal::new(index);

        let source = is_assignable_path(&self.expression.iterable)
            .then(|| (ctx.scope.clone(), self.expression.iterable.clone()));
        let scope = ctx.scope.child();
        scope.define(
            self.expression.item.as_str(),
            Binding::Item(ListItem::new(item.clone(), index.clone(), source)),
        );
        if let Some(index_alias) = &self.expression.index {
            scope.define(index_alias.as_str(), index.clone());
        }

        let node = match doc.clone_deep(self.template) {
            Some(clone) => untracked(|| rt.compile_node(clone, &ctx.with_scope(scope))),
            None => doc.create_comment("missing list template"),
        };
        Entry { node, item, index }
    }

    fn reconcile(&mut self, rt: &Runtime, ctx: &CompileContext, items: Vec<(Value, Value)>) {
        let doc = rt.document();
        let mut previous = std::mem::take(&mut self.entries);
        let mut next: IndexMap<String, Entry> = IndexMap::with_capacity(items.len());

        for (position, (item, index)) in items.into_iter().enumerate() {
            let key = self.key_for(rt, ctx, &item, &index, position);
            let entry = if let Some(entry) = next.shift_remove(&key) {
                tracing::warn!(component = %ctx.component, key = %key, "duplicate list key; the last item wins");
                entry
            } else if let Some(entry) = previous.shift_remove(&key) {
                entry
            } else {
                self.create_entry(rt, ctx, item.clone(), index.clone())
            };
            entry.item.set(item);
            entry.index.set(index);
            next.insert(key, entry);
        }

        for (_, stale) in previous {
            doc.remove_from_region(self.anchor, stale.node);
            rt.lifecycle().cleanup_and_remove(stale.node);
        }

        let mut reference = self.anchor;
        for entry in next.values() {
            if doc.next_sibling(reference) != Some(entry.node) {
                doc.insert_after(reference, entry.node);
            }
            reference = doc.region_end(entry.node);
        }
        doc.set_region(self.anchor, next.values().map(|entry| entry.node).collect());

        self.entries = next;
    }

    fn dispose(&mut self, rt: &Runtime) {
        self.entries.clear();
        rt.document().release(self.template);
    }
}

pub(super) fn compile(rt: &Runtime, node: NodeId, expression: &str, ctx: &CompileContext) -> NodeId {
    let doc = rt.document();
    let parsed = match ListExpression::parse(expression) {
        Ok(parsed) => parsed,
        Err(error) => return rt.structural_error(node, error, ctx),
    };

    let mut key = None;
    for (name, value) in doc.attributes(node) {
        if Directive::classify(rt.config(), &name) == Some(Directive::Key) {
            doc.remove_attribute(node, &name);
            key = Some(value);
        }
    }

    let anchor = doc.create_comment("for");
    doc.replace_with(node, &[anchor]);

    let iterable = parsed.iterable.clone();
    let list = Rc::new(RefCell::new(KeyedList {
        anchor,
        template: node,
        expression: parsed,
        key,
        entries: IndexMap::new(),
    }));

    let (rt2, ctx, state) = (rt.clone(), ctx.clone(), Rc::clone(&list));
    rt.bind_effect(anchor, move || {
        let items = match rt2.evaluate(&iterable, &ctx.scope).and_then(iterate) {
            Ok(items) => items,
            Err(error) => {
                report(&ctx, &iterable, &error);
                Vec::new()
            }
        };
        state.borrow_mut().reconcile(&rt2, &ctx, items);
    });

    let rt2 = rt.clone();
    rt.lifecycle()
        .register(anchor, move || list.borrow_mut().dispose(&rt2));

    anchor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_list_expressions() {
        assert_eq!(
            ListExpression::parse("todo in todos").unwrap(),
            ListExpression {
                item: "todo".into(),
                index: None,
                iterable: "todos".into()
            }
        );
        let parsed = ListExpression::parse("(row, i) of table.rows").unwrap();
        assert_eq!(parsed.index.as_deref(), Some("i"));
        assert_eq!(parsed.iterable, "table.rows");
    }

    #[test]
    fn rejects_malformed_list_expressions() {
        for bad in ["todos", "in todos", "todo in ", "(a, b, c) in xs", "1x in xs", "(a, ) in xs"] {
            assert!(
                matches!(ListExpression::parse(bad), Err(DirectiveError::MalformedList(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn only_plain_paths_accept_item_writes() {
        assert!(is_assignable_path("todos"));
        assert!(is_assignable_path("state.rows"));
        assert!(is_assignable_path("table.0.cells"));
        assert!(!is_assignable_path("5"));
        assert!(!is_assignable_path("rows.filter(done)"));
        assert!(!is_assignable_path("a + b"));
    }

    #[test]
    fn iterates_arrays_objects_and_ranges() {
        assert_eq!(
            iterate(json!(["a", "b"])).unwrap(),
            vec![(json!("a"), json!(0)), (json!("b"), json!(1))]
        );
        assert_eq!(
            iterate(json!({"x": 1})).unwrap(),
            vec![(json!(1), json!("x"))]
        );
        assert_eq!(
            iterate(json!(2)).unwrap(),
            vec![(json!(1), json!(0)), (json!(2), json!(1))]
        );
        assert!(iterate(json!(null)).unwrap().is_empty());
        assert!(iterate(json!("text")).is_err());
        assert!(iterate(json!(-1)).is_err());
    }
}
