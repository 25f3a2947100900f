// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

use crate::node::{node_type, TYPE_KEY};
use crate::Node;

pub const LANE_UI_COMPONENTS: u8 = 0;
pub const LANE_RESOURCES: u8 = 1;
pub const LANE_MICROSERVICES: u8 = 2;
pub const LANE_BACKENDS: u8 = 3;

/// Rendering bucket for a node `type` label. Unknown or missing types land in
/// the backends lane.
#[must_use]
pub fn lane_for_type(node_type: Option<&str>) -> u8 {
    match node_type {
        Some(node_type::UI_COMPONENT) => LANE_UI_COMPONENTS,
        Some(node_type::RESOURCE) => LANE_RESOURCES,
        Some(node_type::MICROSERVICE) => LANE_MICROSERVICES,
        _ => LANE_BACKENDS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneLegend {
    pub lane: u8,
    #[serde(rename = "type")]
    pub label: String,
}

impl LaneLegend {
    #[must_use]
    pub fn new(lane: u8, label: impl Into<String>) -> Self {
        Self {
            lane,
            label: label.into(),
        }
    }
}

#[must_use]
pub fn default_lanes() -> Vec<LaneLegend> {
    vec![
        LaneLegend::new(LANE_UI_COMPONENTS, "UI Components"),
        LaneLegend::new(LANE_RESOURCES, "Resources"),
        LaneLegend::new(LANE_MICROSERVICES, "Microservices"),
        LaneLegend::new(LANE_BACKENDS, "Backends"),
    ]
}

#[must_use]
pub fn default_types() -> Vec<String> {
    [
        node_type::DB,
        node_type::MICROSERVICE,
        node_type::REST,
        node_type::SOAP,
        node_type::JMS,
        node_type::RESOURCE,
    ]
    .iter()
    .map(|t| (*t).to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub lane: u8,
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub source: usize,
    pub target: usize,
}

/// Positional view of a merged node set, shaped for the dashboard renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub directed: bool,
    pub multigraph: bool,
    pub graph: Vec<Value>,
    pub lanes: Vec<LaneLegend>,
    pub types: Vec<String>,
    pub nodes: Vec<GraphNode>,
    pub links: BTreeSet<Link>,
}

impl Default for Graph {
    fn default() -> Self {
        Self {
            directed: true,
            multigraph: false,
            graph: Vec::new(),
            lanes: default_lanes(),
            types: default_types(),
            nodes: Vec::new(),
            links: BTreeSet::new(),
        }
    }
}

impl Graph {
    /// Builds the positional graph from `nodes` in their given order. Every
    /// node is placed by its `type` detail; the node's own `lane` is ignored.
    ///
    /// Link references to ids not present in `nodes` are dropped; identical
    /// edges implied from both ends collapse into one.
    #[must_use]
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id(), idx))
            .collect();

        let mut links = BTreeSet::new();
        for (own, node) in nodes.iter().enumerate() {
            for target in node.linked_to_node_ids() {
                if let Some(&target) = index.get(target.as_str()) {
                    links.insert(Link { source: own, target });
                }
            }
            for source in node.linked_from_node_ids() {
                if let Some(&source) = index.get(source.as_str()) {
                    links.insert(Link { source, target: own });
                }
            }
        }

        let nodes = nodes
            .iter()
            .map(|node| GraphNode {
                id: node.id().to_string(),
                lane: lane_for_type(node.details().get(TYPE_KEY).and_then(Value::as_str)),
                details: node.details().clone(),
            })
            .collect();

        Self {
            nodes,
            links,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_legend(mut self, lanes: Vec<LaneLegend>, types: Vec<String>) -> Self {
        self.lanes = lanes;
        self.types = types;
        self
    }

    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}
