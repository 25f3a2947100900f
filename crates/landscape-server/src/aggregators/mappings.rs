// SPDX-License-Identifier: Apache-2.0

use landscape_model::{
    node_type, Node, Status, LANE_MICROSERVICES, LANE_RESOURCES, METHODS_KEY, STATUS_KEY,
    TYPE_KEY, URL_KEY,
};
use regex::Regex;
use serde_json::{Map, Value};

use super::{PayloadConverter, ServiceAggregator};
use crate::config::MAPPINGS_KEY;
use crate::discovery::ServiceInstance;
use crate::uri::UriResolver;
use crate::ConvertError;

const HANDLER_METHOD: &str = "method";

pub type MappingsAggregator = ServiceAggregator<MappingsConverter>;

/// Reads a request-mapping dump keyed like `{[/path],methods=[GET]}`.
/// Keys of any other shape are ignored.
#[derive(Debug, Clone)]
pub struct MappingsConverter {
    mapping_key: Regex,
    url: Regex,
    methods: Regex,
    framework_handler: Regex,
}

impl MappingsConverter {
    pub fn new() -> Result<Self, String> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| e.to_string());
        Ok(Self {
            mapping_key: compile(r"^\{.*\[/.*\].*\}$")?,
            url: compile(r"\{.*\[(/[^\]]*)\].*\}")?,
            methods: compile(r"\{.*methods=\[([^\]]*)\].*\}")?,
            framework_handler: compile(r"^[a-z]* .* org\.springframework.*$")?,
        })
    }

    fn is_framework_handler(&self, mapping: &Map<String, Value>) -> bool {
        mapping
            .get(HANDLER_METHOD)
            .and_then(Value::as_str)
            .is_some_and(|method| self.framework_handler.is_match(method))
    }

    #[must_use]
    pub fn extract_url<'a>(&self, key: &'a str) -> Option<&'a str> {
        self.url
            .captures(key)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    #[must_use]
    pub fn extract_methods<'a>(&self, key: &'a str) -> Option<&'a str> {
        self.methods
            .captures(key)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    #[must_use]
    pub fn convert_nodes(&self, service_id: &str, payload: &Map<String, Value>) -> Vec<Node> {
        let mut root = Node::builder(service_id)
            .lane(LANE_MICROSERVICES)
            .detail(TYPE_KEY, node_type::MICROSERVICE)
            .detail(STATUS_KEY, Status::Up)
            .build();
        let mut resources: Vec<Node> = Vec::new();

        for (key, mapping) in payload {
            if !self.mapping_key.is_match(key) {
                continue;
            }
            let Some(mapping) = mapping.as_object() else {
                continue;
            };
            if self.is_framework_handler(mapping) {
                continue;
            }
            let Some(url) = self.extract_url(key) else {
                continue;
            };
            let mut resource = Node::builder(url)
                .lane(LANE_RESOURCES)
                .detail(URL_KEY, url)
                .detail(TYPE_KEY, node_type::RESOURCE)
                .detail(STATUS_KEY, Status::Up)
                .linked_to(service_id);
            if let Some(methods) = self.extract_methods(key) {
                resource = resource.detail(METHODS_KEY, methods);
            }
            root.link_from(url);
            let resource = resource.build();
            // One path may be mapped once per verb; keep a single vertex.
            match resources.iter_mut().find(|r| r.id() == resource.id()) {
                Some(existing) => existing.merge_with(resource),
                None => resources.push(resource),
            }
        }

        let mut nodes = Vec::with_capacity(resources.len() + 1);
        nodes.push(root);
        nodes.extend(resources);
        nodes
    }
}

impl PayloadConverter for MappingsConverter {
    fn key(&self) -> &'static str {
        MAPPINGS_KEY
    }

    fn resolve_url(&self, resolver: &dyn UriResolver, instance: &ServiceInstance) -> String {
        resolver.resolve_mappings_url(instance)
    }

    fn convert(
        &self,
        service_id: &str,
        _home_page_url: &str,
        payload: &Map<String, Value>,
    ) -> Result<Vec<Node>, ConvertError> {
        Ok(self.convert_nodes(service_id, payload))
    }
}
