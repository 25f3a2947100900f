// SPDX-License-Identifier: Apache-2.0

use landscape_model::{merge_nodes, Graph, Node};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn node_strategy(id: &'static str) -> impl Strategy<Value = Node> {
    (
        btree_set("[a-e]", 0..4),
        btree_set("[a-e]", 0..4),
        prop::option::of(prop::sample::select(vec!["UP", "DOWN", "UNKNOWN"])),
        prop::option::of("[a-z]{1,4}"),
    )
        .prop_map(move |(to, from, status, group)| {
            let mut b = Node::builder(id);
            for t in to {
                b = b.linked_to(t);
            }
            for f in from {
                b = b.linked_from(f);
            }
            if let Some(s) = status {
                b = b.detail("status", s);
            }
            if let Some(g) = group {
                b = b.detail("group", g);
            }
            b.build()
        })
}

fn graph_nodes() -> impl Strategy<Value = Vec<Node>> {
    vec(
        (
            "[a-f]",
            btree_set("[a-h]", 0..4),
            btree_set("[a-h]", 0..4),
        ),
        0..12,
    )
    .prop_map(|rows| {
        let nodes = rows.into_iter().map(|(id, to, from)| {
            let mut b = Node::builder(id);
            for t in to {
                b = b.linked_to(t);
            }
            for f in from {
                b = b.linked_from(f);
            }
            b.build()
        });
        merge_nodes(nodes)
    })
}

proptest! {
    #![proptest_config(Config::with_cases(128))]

    #[test]
    fn link_union_is_commutative(a in node_strategy("svc"), b in node_strategy("svc")) {
        let mut ab = a.clone();
        ab.merge_with(b.clone());
        let mut ba = b;
        ba.merge_with(a);
        prop_assert_eq!(ab.linked_to_node_ids(), ba.linked_to_node_ids());
        prop_assert_eq!(ab.linked_from_node_ids(), ba.linked_from_node_ids());
        prop_assert_eq!(ab.status(), ba.status());
        prop_assert_eq!(ab.details().contains_key("group"), ba.details().contains_key("group"));
    }

    #[test]
    fn mapped_links_index_into_node_array(nodes in graph_nodes()) {
        let graph = Graph::from_nodes(&nodes);
        prop_assert_eq!(graph.nodes.len(), nodes.len());
        for link in &graph.links {
            prop_assert!(link.source < graph.nodes.len());
            prop_assert!(link.target < graph.nodes.len());
        }
    }
}
