//! Property tests for keyed list reconciliation.
//!
//! For any pair of key sequences:
//!
//! 1. The rendered order matches the keys after each pass.
//! 2. A key present in both passes keeps its node.
//! 3. A key dropped by the second pass has its node freed.

use std::collections::HashMap;

use proptest::prelude::*;
use serde_json::json;

use trellis_core::{CompileContext, Runtime, Scope, Signal, TemplateNode, Value};

/// Distinct keys in a random order.
fn keys_strategy() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::hash_set(0u32..40, 0..16)
        .prop_map(|keys| keys.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn rows(keys: &[u32]) -> Value {
    Value::Array(
        keys.iter()
            .map(|key| json!({"id": key, "label": format!("row {key}")}))
            .collect(),
    )
}

proptest! {
    #[test]
    fn reconciliation_reorders_and_reuses(first in keys_strategy(), second in keys_strategy()) {
        let rt = Runtime::new();
        let doc = rt.document().clone();
        let host = doc.create_element("main");
        let items = Signal::new(rows(&first));
        let scope = Scope::new();
        scope.define("items", items.clone());

        let template = TemplateNode::element("ul").child(
            TemplateNode::element("li")
                .attr("v-for", "item in items")
                .attr(":key", "item.id")
                .child(TemplateNode::text("{{ item.label }}")),
        );
        let ul = rt.render(&template, host, &CompileContext::new(scope));

        let before: HashMap<u32, _> = first
            .iter()
            .copied()
            .zip(doc.query_all(ul, "li"))
            .collect();
        prop_assert_eq!(before.len(), first.len());

        items.set(rows(&second));
        let after = doc.query_all(ul, "li");
        prop_assert_eq!(after.len(), second.len());

        for (key, node) in second.iter().zip(&after) {
            prop_assert_eq!(doc.text_content(*node), format!("row {key}"));
            if let Some(previous) = before.get(key) {
                prop_assert_eq!(previous, node);
            }
        }
        for (key, node) in &before {
            if !second.contains(key) {
                prop_assert!(!doc.contains(*node));
            }
        }
    }
}
