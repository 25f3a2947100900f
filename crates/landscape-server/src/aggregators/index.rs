// SPDX-License-Identifier: Apache-2.0

use landscape_model::{
    node_type, Node, Status, DOCS_KEY, LANE_MICROSERVICES, LANE_RESOURCES, STATUS_KEY, TYPE_KEY,
    URL_KEY,
};
use serde_json::{Map, Value};
use tracing::debug;

use super::{PayloadConverter, ServiceAggregator};
use crate::config::INDEX_KEY;
use crate::discovery::ServiceInstance;
use crate::uri::UriResolver;
use crate::ConvertError;

const LINKS: &str = "_links";
const CURIES: &str = "curies";
const HREF: &str = "href";
const CURIE_NAME: &str = "name";

pub type IndexAggregator = ServiceAggregator<IndexConverter>;

/// Reads a HAL index document. Third-party documents vary, so a missing
/// `_links` section yields no nodes instead of an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexConverter;

impl IndexConverter {
    #[must_use]
    pub fn convert_nodes(
        &self,
        service_id: &str,
        service_uri: &str,
        payload: &Map<String, Value>,
    ) -> Vec<Node> {
        let Some(links) = payload.get(LINKS).and_then(Value::as_object) else {
            debug!(service_id = %service_id, "index has no HAL _links at the root");
            return Vec::new();
        };
        let curies = links.get(CURIES).and_then(Value::as_array);

        let mut service = Node::builder(service_id).lane(LANE_MICROSERVICES).build();
        let mut resources = Vec::new();
        for (rel, link) in links.iter().filter(|(rel, _)| rel.as_str() != CURIES) {
            service.link_from(rel.as_str());
            let mut resource = Node::builder(rel.as_str())
                .lane(LANE_RESOURCES)
                .linked_to(service_id)
                .detail(TYPE_KEY, node_type::RESOURCE)
                .detail(STATUS_KEY, Status::Up)
                .build();
            if let Some(href) = link_href(link) {
                resource.details_mut().insert(URL_KEY.to_string(), href.into());
            }
            if let Some(docs) = curies.and_then(|c| resolve_docs(rel, c, service_uri)) {
                resource.details_mut().insert(DOCS_KEY.to_string(), docs.into());
            }
            resources.push(resource);
        }

        let mut nodes = Vec::with_capacity(resources.len() + 1);
        nodes.push(service);
        nodes.extend(resources);
        nodes
    }
}

// HAL allows a relation to hold an array of links; the first one stands in.
fn link_href(link: &Value) -> Option<&str> {
    let link = match link {
        Value::Array(items) => items.first()?,
        other => other,
    };
    link.get(HREF).and_then(Value::as_str)
}

fn resolve_docs(rel: &str, curies: &[Value], service_uri: &str) -> Option<String> {
    let (namespace, suffix) = rel.split_once(':')?;
    curies
        .iter()
        .find(|curie| curie.get(CURIE_NAME).and_then(Value::as_str) == Some(namespace))
        .and_then(|curie| curie.get(HREF).and_then(Value::as_str))
        .map(|template| format!("{service_uri}{}", template.replace("{rel}", suffix)))
}

impl PayloadConverter for IndexConverter {
    fn key(&self) -> &'static str {
        INDEX_KEY
    }

    fn resolve_url(&self, resolver: &dyn UriResolver, instance: &ServiceInstance) -> String {
        resolver.resolve_home_page_url(instance)
    }

    fn convert(
        &self,
        service_id: &str,
        home_page_url: &str,
        payload: &Map<String, Value>,
    ) -> Result<Vec<Node>, ConvertError> {
        Ok(self.convert_nodes(service_id, home_page_url, payload))
    }
}
