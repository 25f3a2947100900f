// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::AggregationError;

/// One reachable copy of a service as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub uri: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    #[must_use]
    pub fn new(service_id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            uri: uri.into(),
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Query side of a service registry.
///
/// An empty instance list is a valid answer; `Err` means the registry itself
/// could not be asked.
#[async_trait]
pub trait DiscoveryClient: Send + Sync + 'static {
    async fn list_service_ids(&self) -> Result<Vec<String>, AggregationError>;
    async fn get_instances(&self, service_id: &str)
        -> Result<Vec<ServiceInstance>, AggregationError>;
}

/// Registry backed by a fixed list, for deployments without a live registry.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    services: BTreeMap<String, Vec<ServiceInstance>>,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(instances: Vec<ServiceInstance>) -> Self {
        let mut services: BTreeMap<String, Vec<ServiceInstance>> = BTreeMap::new();
        for instance in instances {
            services
                .entry(instance.service_id.clone())
                .or_default()
                .push(instance);
        }
        Self { services }
    }

    /// Parses `id=uri` pairs separated by commas; a repeated id adds another
    /// instance for that service.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut instances = Vec::new();
        for piece in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (id, uri) = piece
                .split_once('=')
                .ok_or_else(|| format!("invalid service entry `{piece}`: expected id=uri"))?;
            let (id, uri) = (id.trim(), uri.trim());
            if id.is_empty() || uri.is_empty() {
                return Err(format!("invalid service entry `{piece}`: empty id or uri"));
            }
            instances.push(ServiceInstance::new(id, uri));
        }
        Ok(Self::new(instances))
    }

    /// Loads a JSON array of `{service_id, uri, metadata?}` objects.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("read services file {} failed: {e}", path.display()))?;
        let instances: Vec<ServiceInstance> = serde_json::from_slice(&bytes)
            .map_err(|e| format!("parse services file {} failed: {e}", path.display()))?;
        Ok(Self::new(instances))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl DiscoveryClient for StaticDiscovery {
    async fn list_service_ids(&self) -> Result<Vec<String>, AggregationError> {
        Ok(self.services.keys().cloned().collect())
    }

    async fn get_instances(
        &self,
        service_id: &str,
    ) -> Result<Vec<ServiceInstance>, AggregationError> {
        Ok(self
            .services
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(service_id))
            .map(|(_, instances)| instances.clone())
            .unwrap_or_default())
    }
}
