// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::serde_helpers::{lenient_lane, null_as_default};

pub const STATUS_KEY: &str = "status";
pub const TYPE_KEY: &str = "type";
pub const URL_KEY: &str = "url";
pub const DOCS_KEY: &str = "docs";
pub const METHODS_KEY: &str = "methods";
pub const GROUP_KEY: &str = "group";
pub const VIRTUAL_KEY: &str = "virtual";

pub const MAX_LANE: u8 = 3;

/// Well-known values of the `type` detail.
pub mod node_type {
    pub const UI_COMPONENT: &str = "UI_COMPONENT";
    pub const RESOURCE: &str = "RESOURCE";
    pub const MICROSERVICE: &str = "MICROSERVICE";
    pub const DB: &str = "DB";
    pub const REST: &str = "REST";
    pub const SOAP: &str = "SOAP";
    pub const JMS: &str = "JMS";
}

/// Health of a vertex as reported by its sources.
///
/// Merging two statuses follows the lattice `DOWN > UP > UNKNOWN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Unknown,
    Up,
    Down,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }

    /// Anything that is not literally `UP` or `DOWN` collapses to `UNKNOWN`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some("DOWN") => Self::Down,
            Some("UP") => Self::Up,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Status> for Value {
    fn from(status: Status) -> Self {
        Value::String(status.as_str().to_string())
    }
}

/// Canonical vertex of the landscape graph.
///
/// Identity is the `id` alone: equality and hashing ignore every other field.
/// The id is fixed at construction; all other fields may grow through merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    id: String,
    #[serde(default, deserialize_with = "null_as_default::deserialize")]
    details: Map<String, Value>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_lane::deserialize"
    )]
    lane: Option<u8>,
    #[serde(
        default,
        rename = "linkedToNodeIds",
        deserialize_with = "null_as_default::deserialize"
    )]
    linked_to_node_ids: BTreeSet<String>,
    #[serde(
        default,
        rename = "linkedFromNodeIds",
        deserialize_with = "null_as_default::deserialize"
    )]
    linked_from_node_ids: BTreeSet<String>,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            details: Map::new(),
            lane: None,
            linked_to_node_ids: BTreeSet::new(),
            linked_from_node_ids: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn builder(id: impl Into<String>) -> NodeBuilder {
        NodeBuilder {
            node: Self::new(id),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.details
    }

    #[must_use]
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.details.get(STATUS_KEY).map(Status::from_value)
    }

    #[must_use]
    pub fn node_type(&self) -> Option<&str> {
        self.detail_str(TYPE_KEY)
    }

    #[must_use]
    pub fn lane(&self) -> Option<u8> {
        self.lane
    }

    pub fn set_lane(&mut self, lane: u8) {
        self.lane = Some(lane.min(MAX_LANE));
    }

    #[must_use]
    pub fn linked_to_node_ids(&self) -> &BTreeSet<String> {
        &self.linked_to_node_ids
    }

    #[must_use]
    pub fn linked_from_node_ids(&self) -> &BTreeSet<String> {
        &self.linked_from_node_ids
    }

    pub fn link_to(&mut self, id: impl Into<String>) {
        self.linked_to_node_ids.insert(id.into());
    }

    pub fn link_from(&mut self, id: impl Into<String>) {
        self.linked_from_node_ids.insert(id.into());
    }

    /// Folds `other` into `self`, assuming both describe the same id.
    ///
    /// Lane: first set value wins. Link sets: union. Details: keys known on
    /// only one side pass through; on conflict `status` follows the status
    /// lattice and every other key keeps the existing value.
    pub fn merge_with(&mut self, other: Node) {
        if self.lane.is_none() {
            self.lane = other.lane;
        }
        self.linked_to_node_ids.extend(other.linked_to_node_ids);
        self.linked_from_node_ids.extend(other.linked_from_node_ids);

        for (key, incoming) in other.details {
            if incoming.is_null() {
                continue;
            }
            match self.details.get_mut(&key) {
                Some(existing) if key == STATUS_KEY => {
                    let merged = Status::from_value(existing).merge(Status::from_value(&incoming));
                    *existing = merged.into();
                }
                Some(existing) if existing.is_null() => *existing = incoming,
                Some(_) => {}
                None => {
                    self.details.insert(key, incoming);
                }
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone)]
#[must_use]
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.node.details.insert(key.into(), value.into());
        self
    }

    pub fn details(mut self, details: Map<String, Value>) -> Self {
        self.node.details.extend(details);
        self
    }

    pub fn status(self, status: Status) -> Self {
        self.detail(STATUS_KEY, status)
    }

    pub fn node_type(self, node_type: &str) -> Self {
        self.detail(TYPE_KEY, node_type)
    }

    pub fn lane(mut self, lane: u8) -> Self {
        self.node.set_lane(lane);
        self
    }

    pub fn linked_to(mut self, id: impl Into<String>) -> Self {
        self.node.link_to(id);
        self
    }

    pub fn linked_from(mut self, id: impl Into<String>) -> Self {
        self.node.link_from(id);
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}
