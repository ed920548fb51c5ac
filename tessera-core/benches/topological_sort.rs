//! Benchmark: Topological Sort
//!
//! Measures stable topological sort on chains and wide diamonds inserted in
//! reverse dependency order.
//! Run: cargo bench --bench topological_sort

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::graph::{ComputeGraph, NodeId};
use tessera_core::{GraphConfig, Module};

const UNCHECKED: GraphConfig = GraphConfig {
    verify_mutations: false,
};

/// Chain n-1 -> ... -> 1 -> 0, inserted head first so the sort has to reverse it.
fn build_chain(graph: &mut ComputeGraph<'_>, size: usize) {
    let ids: Vec<NodeId> = (0..size)
        .map(|i| {
            let id = graph.add_node("Op", usize::from(i + 1 < size));
            graph.add_output(id, format!("v{i}")).unwrap();
            id
        })
        .collect();
    for pair in ids.windows(2) {
        graph.connect(pair[1], 0, pair[0], 0).unwrap();
    }
}

/// Source -> (middle_0 .. middle_width) -> sink, sink inserted first.
fn build_diamond(graph: &mut ComputeGraph<'_>, width: usize) {
    let sink = graph.add_node("Concat", width);
    let source = graph.add_node("Input", 0);
    graph.add_output(source, "x").unwrap();
    for i in 0..width {
        let middle = graph.add_node("Relu", 1);
        graph.add_output(middle, format!("m{i}")).unwrap();
        graph.connect(source, 0, middle, 0).unwrap();
        graph.connect(middle, 0, sink, i).unwrap();
    }
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_sort/chain");
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut module = Module::new();
                let mut graph = ComputeGraph::with_config("chain", &mut module, UNCHECKED);
                build_chain(&mut graph, size);
                black_box(graph.topological_sort()).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_diamond(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_sort/diamond");
    for width in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let mut module = Module::new();
                let mut graph = ComputeGraph::with_config("diamond", &mut module, UNCHECKED);
                build_diamond(&mut graph, width);
                black_box(graph.topological_sort()).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chain, bench_diamond);
criterion_main!(benches);
