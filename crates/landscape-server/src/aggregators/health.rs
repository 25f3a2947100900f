// SPDX-License-Identifier: Apache-2.0

use landscape_model::{node_type, Node, STATUS_KEY, TYPE_KEY};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::{PayloadConverter, ServiceAggregator};
use crate::config::HEALTH_KEY;
use crate::discovery::ServiceInstance;
use crate::uri::UriResolver;
use crate::ConvertError;

pub type HealthAggregator = ServiceAggregator<HealthConverter>;

/// Reads an actuator-style health document.
///
/// The document has a fixed shape, so a missing root `status` is an error
/// rather than an empty result.
#[derive(Debug, Clone, Default)]
pub struct HealthConverter {
    infrastructure_keys: BTreeSet<String>,
}

impl HealthConverter {
    #[must_use]
    pub fn new(infrastructure_keys: BTreeSet<String>) -> Self {
        Self {
            infrastructure_keys,
        }
    }

    pub fn convert_nodes(
        &self,
        service_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<Vec<Node>, ConvertError> {
        let status = payload.get(STATUS_KEY).ok_or_else(|| {
            ConvertError(format!(
                "health of {service_id} has no status at the root"
            ))
        })?;

        let mut root = Node::builder(service_id)
            .detail(STATUS_KEY, status.clone())
            .detail(TYPE_KEY, node_type::MICROSERVICE)
            .build();
        let mut dependencies = Vec::new();

        for (key, value) in payload {
            if key == STATUS_KEY {
                continue;
            }
            let indicator = value
                .as_object()
                .filter(|nested| nested.contains_key(STATUS_KEY));
            match indicator {
                Some(nested) if !self.infrastructure_keys.contains(key) => {
                    root.link_to(key.as_str());
                    dependencies.push(
                        Node::builder(key.as_str())
                            .details(nested.clone())
                            .linked_from(service_id)
                            .build(),
                    );
                }
                _ => {
                    root.details_mut().insert(key.clone(), value.clone());
                }
            }
        }

        let mut nodes = Vec::with_capacity(dependencies.len() + 1);
        nodes.push(root);
        nodes.extend(dependencies);
        Ok(nodes)
    }
}

impl PayloadConverter for HealthConverter {
    fn key(&self) -> &'static str {
        HEALTH_KEY
    }

    fn resolve_url(&self, resolver: &dyn UriResolver, instance: &ServiceInstance) -> String {
        resolver.resolve_health_check_url(instance)
    }

    fn convert(
        &self,
        service_id: &str,
        _home_page_url: &str,
        payload: &Map<String, Value>,
    ) -> Result<Vec<Node>, ConvertError> {
        self.convert_nodes(service_id, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object payload")
    }

    fn converter() -> HealthConverter {
        HealthConverter::new(["diskSpace", "hystrix"].iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn nested_indicator_becomes_dependency() {
        let nodes = converter()
            .convert_nodes(
                "svc",
                &object(json!({"status": "UP", "svcX": {"status": "DOWN", "type": "SOAP"}})),
            )
            .expect("convert health");
        assert_eq!(nodes.len(), 2);
        let root = &nodes[0];
        assert_eq!(root.id(), "svc");
        assert_eq!(root.detail_str("type"), Some("MICROSERVICE"));
        assert_eq!(root.detail_str("status"), Some("UP"));
        assert!(root.linked_to_node_ids().contains("svcX"));
        let dep = &nodes[1];
        assert_eq!(dep.id(), "svcX");
        assert_eq!(dep.detail_str("type"), Some("SOAP"));
        assert_eq!(dep.detail_str("status"), Some("DOWN"));
        assert!(dep.linked_from_node_ids().contains("svc"));
    }

    #[test]
    fn missing_status_fails() {
        let err = converter()
            .convert_nodes("svc", &object(json!({"test": "test"})))
            .expect_err("no status");
        assert!(err.to_string().contains("no status"));
    }

    #[test]
    fn infrastructure_and_plain_keys_fold_into_root() {
        let nodes = converter()
            .convert_nodes(
                "svc",
                &object(json!({
                    "status": "UP",
                    "diskSpace": {"status": "UP", "free": 10},
                    "description": "orders",
                    "db": {"status": "UP", "database": "H2"},
                    "meta": {"version": 3}
                })),
            )
            .expect("convert health");
        assert_eq!(nodes.len(), 2);
        let root = &nodes[0];
        assert_eq!(root.details()["diskSpace"], json!({"status": "UP", "free": 10}));
        assert_eq!(root.detail_str("description"), Some("orders"));
        assert_eq!(root.details()["meta"], json!({"version": 3}));
        assert_eq!(nodes[1].id(), "db");
        assert_eq!(nodes[1].detail_str("database"), Some("H2"));
    }
}
