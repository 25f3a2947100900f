// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::Node;

/// Accumulates nodes from any number of sources, folding records that share
/// an id into the first one seen.
///
/// Ids are compared exactly; callers normalise case before nodes get here.
/// Positions follow first arrival, which is what the graph mapper uses for
/// vertex indices.
#[derive(Debug, Default)]
pub struct NodeMerger {
    nodes: Vec<Node>,
    positions: HashMap<String, usize>,
}

impl NodeMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) {
        match self.positions.get(node.id()) {
            Some(&idx) => self.nodes[idx].merge_with(node),
            None => {
                self.positions.insert(node.id().to_string(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = Node>>(&mut self, nodes: I) {
        for node in nodes {
            self.push(node);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.positions.get(id).map(|&idx| &self.nodes[idx])
    }

    #[must_use]
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

impl FromIterator<Node> for NodeMerger {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut merger = Self::new();
        merger.extend(iter);
        merger
    }
}

/// One-shot fold of an unordered node stream into a deduplicated list.
#[must_use]
pub fn merge_nodes<I: IntoIterator<Item = Node>>(nodes: I) -> Vec<Node> {
    nodes.into_iter().collect::<NodeMerger>().into_nodes()
}
