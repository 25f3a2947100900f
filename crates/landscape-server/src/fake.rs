// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::caller::{JsonFetcher, OutboundRequest};
use crate::discovery::{DiscoveryClient, ServiceInstance};
use crate::AggregationError;

/// Scriptable registry for tests.
#[derive(Default)]
pub struct FakeDiscovery {
    pub services: Mutex<BTreeMap<String, Vec<ServiceInstance>>>,
    /// Instance lookups for these ids fail outright.
    pub broken_lookups: Mutex<BTreeSet<String>>,
    /// Number of upcoming `list_service_ids` calls that fail.
    pub listing_failures: AtomicU64,
    pub list_calls: AtomicU64,
}

impl FakeDiscovery {
    pub async fn add_instance(&self, service_id: &str, uri: &str) {
        self.services
            .lock()
            .await
            .entry(service_id.to_string())
            .or_default()
            .push(ServiceInstance::new(service_id, uri));
    }

    pub async fn add_service_without_instances(&self, service_id: &str) {
        self.services
            .lock()
            .await
            .entry(service_id.to_string())
            .or_default();
    }
}

#[async_trait]
impl DiscoveryClient for FakeDiscovery {
    async fn list_service_ids(&self) -> Result<Vec<String>, AggregationError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.listing_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.listing_failures.store(remaining - 1, Ordering::Relaxed);
            return Err(AggregationError::Discovery("registry unavailable".to_string()));
        }
        Ok(self.services.lock().await.keys().cloned().collect())
    }

    async fn get_instances(
        &self,
        service_id: &str,
    ) -> Result<Vec<ServiceInstance>, AggregationError> {
        if self.broken_lookups.lock().await.contains(service_id) {
            return Err(AggregationError::Discovery(format!(
                "instance lookup for {service_id} failed"
            )));
        }
        Ok(self
            .services
            .lock()
            .await
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(service_id))
            .map(|(_, instances)| instances.clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub enum FakeResponse {
    Json(Value),
    Status(u16),
    Transport(String),
}

/// URL-keyed canned responses; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    pub responses: Mutex<HashMap<String, FakeResponse>>,
    pub seen_headers: Mutex<HashMap<String, BTreeMap<String, String>>>,
    pub fetch_calls: AtomicU64,
}

impl FakeFetcher {
    pub async fn respond(&self, url: &str, response: FakeResponse) {
        self.responses
            .lock()
            .await
            .insert(url.to_string(), response);
    }

    pub async fn respond_json(&self, url: &str, body: Value) {
        self.respond(url, FakeResponse::Json(body)).await;
    }
}

#[async_trait]
impl JsonFetcher for FakeFetcher {
    async fn fetch(&self, request: &OutboundRequest) -> Result<Value, AggregationError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        let headers = request
            .headers
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect();
        self.seen_headers
            .lock()
            .await
            .insert(request.url.clone(), headers);
        let response = self
            .responses
            .lock()
            .await
            .get(&request.url)
            .cloned()
            .unwrap_or(FakeResponse::Status(404));
        match response {
            FakeResponse::Json(body) => Ok(body),
            FakeResponse::Status(status) => Err(AggregationError::HttpStatus {
                url: request.url.clone(),
                status,
            }),
            FakeResponse::Transport(message) => Err(AggregationError::Transport {
                url: request.url.clone(),
                message,
            }),
        }
    }
}
