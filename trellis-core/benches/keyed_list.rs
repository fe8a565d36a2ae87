//! Benchmarks for keyed list reconciliation.
//!
//! Run with: cargo bench -p trellis-core --bench keyed_list

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;

use trellis_core::{CompileContext, Runtime, Scope, Signal, TemplateNode, Value};

fn rows(keys: impl Iterator<Item = usize>) -> Value {
    Value::Array(keys.map(|key| json!({"id": key, "label": key})).collect())
}

/// A rendered `<ul>` whose items are driven by the returned signal.
fn rendered_list(len: usize) -> (Runtime, Signal<Value>) {
    let rt = Runtime::new();
    let host = rt.document().create_element("main");
    let items = Signal::new(rows(0..len));
    let scope = Scope::new();
    scope.define("items", items.clone());
    let template = TemplateNode::element("ul").child(
        TemplateNode::element("li")
            .attr("v-for", "item in items")
            .attr(":key", "item.id")
            .child(TemplateNode::text("{{ item.label }}")),
    );
    rt.render(&template, host, &CompileContext::new(scope));
    (rt, items)
}

fn bench_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list/reverse");

    for len in [10, 100, 1000] {
        group.throughput(Throughput::Elements(len as u64));
        let (_rt, items) = rendered_list(len);
        let forward = rows(0..len);
        let backward = rows((0..len).rev());
        let mut flip = false;
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                flip = !flip;
                let next = if flip { &backward } else { &forward };
                black_box(items.set(next.clone()))
            })
        });
    }

    group.finish();
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list/append_one");

    for len in [10, 100, 1000] {
        let (_rt, items) = rendered_list(len);
        let base = rows(0..len);
        let grown = rows(0..=len);
        let mut grow = false;
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                grow = !grow;
                let next = if grow { &grown } else { &base };
                black_box(items.set(next.clone()))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reverse, bench_append);
criterion_main!(benches);
