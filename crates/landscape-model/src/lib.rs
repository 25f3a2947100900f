#![forbid(unsafe_code)]
//! Landscape model: vertices, their merge rules and the positional graph.

mod event;
mod graph;
mod merge;
mod node;
mod serde_helpers;

pub use event::{EventLevel, SystemEvent};
pub use graph::{
    default_lanes, default_types, lane_for_type, Graph, GraphNode, LaneLegend, Link,
    LANE_BACKENDS, LANE_MICROSERVICES, LANE_RESOURCES, LANE_UI_COMPONENTS,
};
pub use merge::{merge_nodes, NodeMerger};
pub use node::{
    node_type, Node, NodeBuilder, Status, DOCS_KEY, GROUP_KEY, MAX_LANE, METHODS_KEY, STATUS_KEY,
    TYPE_KEY, URL_KEY, VIRTUAL_KEY,
};

pub const CRATE_NAME: &str = "landscape-model";
