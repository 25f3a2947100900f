// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use landscape_model::{merge_nodes, Graph, Node, Status};
use landscape_server::aggregators::mappings::MappingsConverter;
use serde_json::{json, Map, Value};

// Three sources reporting overlapping views of `services` services.
fn landscape(services: usize) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(services * 4);
    for source in 0..3 {
        for i in 0..services {
            let status = if (i + source) % 7 == 0 { Status::Down } else { Status::Up };
            nodes.push(
                Node::builder(format!("svc-{i}"))
                    .node_type("MICROSERVICE")
                    .status(status)
                    .linked_to(format!("svc-{}", (i + 1) % services))
                    .linked_to(format!("db-{}", i % 16))
                    .build(),
            );
        }
    }
    for db in 0..16 {
        nodes.push(Node::builder(format!("db-{db}")).node_type("DB").build());
    }
    nodes
}

fn mappings_payload(paths: usize) -> Map<String, Value> {
    (0..paths)
        .map(|i| {
            (
                format!("{{[/api/resource{i}],methods=[GET || POST]}}"),
                json!({"bean": "handler", "method": format!("public Object handle{i}()")}),
            )
        })
        .collect()
}

fn bench_merge_and_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_assembly");
    for services in [50_usize, 500] {
        let nodes = landscape(services);
        group.bench_with_input(BenchmarkId::new("merge_then_map", services), &nodes, |b, nodes| {
            b.iter(|| {
                let merged = merge_nodes(nodes.iter().cloned());
                black_box(Graph::from_nodes(&merged));
            });
        });
    }
    group.finish();
}

fn bench_mappings_conversion(c: &mut Criterion) {
    let converter = MappingsConverter::new().expect("mapping regexes compile");
    let payload = mappings_payload(200);
    c.bench_function("mappings_convert_200_paths", |b| {
        b.iter(|| black_box(converter.convert_nodes("orders", &payload)));
    });
}

criterion_group!(benches, bench_merge_and_map, bench_mappings_conversion);
criterion_main!(benches);
