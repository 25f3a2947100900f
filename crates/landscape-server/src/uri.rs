// SPDX-License-Identifier: Apache-2.0

use crate::discovery::ServiceInstance;

pub const HOME_PAGE_URL_KEY: &str = "homePageUrl";
pub const HEALTH_CHECK_URL_KEY: &str = "healthCheckUrl";
pub const MAPPINGS_URL_KEY: &str = "mappingsUrl";

pub trait UriResolver: Send + Sync + 'static {
    fn resolve_home_page_url(&self, instance: &ServiceInstance) -> String;
    fn resolve_health_check_url(&self, instance: &ServiceInstance) -> String;
    fn resolve_mappings_url(&self, instance: &ServiceInstance) -> String;
}

fn join(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// Derives every endpoint from the instance base URI.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUriResolver;

impl UriResolver for DefaultUriResolver {
    fn resolve_home_page_url(&self, instance: &ServiceInstance) -> String {
        instance.uri.trim_end_matches('/').to_string()
    }

    fn resolve_health_check_url(&self, instance: &ServiceInstance) -> String {
        join(&instance.uri, "/health")
    }

    fn resolve_mappings_url(&self, instance: &ServiceInstance) -> String {
        join(&instance.uri, "/mappings")
    }
}

/// Registry-style resolver: instances may advertise their endpoints in
/// metadata, otherwise the default derivation applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataUriResolver;

impl MetadataUriResolver {
    fn advertised<'a>(instance: &'a ServiceInstance, key: &str) -> Option<&'a str> {
        instance
            .metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

impl UriResolver for MetadataUriResolver {
    fn resolve_home_page_url(&self, instance: &ServiceInstance) -> String {
        Self::advertised(instance, HOME_PAGE_URL_KEY)
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DefaultUriResolver.resolve_home_page_url(instance))
    }

    fn resolve_health_check_url(&self, instance: &ServiceInstance) -> String {
        match Self::advertised(instance, HEALTH_CHECK_URL_KEY) {
            Some(url) => url.to_string(),
            None => join(&self.resolve_home_page_url(instance), "/health"),
        }
    }

    fn resolve_mappings_url(&self, instance: &ServiceInstance) -> String {
        match Self::advertised(instance, MAPPINGS_URL_KEY) {
            Some(url) => url.to_string(),
            None => join(&self.resolve_home_page_url(instance), "/mappings"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolver_appends_actuator_paths() {
        let instance = ServiceInstance::new("svc", "http://svc:8080/");
        assert_eq!(DefaultUriResolver.resolve_home_page_url(&instance), "http://svc:8080");
        assert_eq!(
            DefaultUriResolver.resolve_health_check_url(&instance),
            "http://svc:8080/health"
        );
        assert_eq!(
            DefaultUriResolver.resolve_mappings_url(&instance),
            "http://svc:8080/mappings"
        );
    }

    #[test]
    fn metadata_resolver_prefers_advertised_urls() {
        let instance = ServiceInstance::new("svc", "http://10.0.0.4:8080")
            .with_metadata(HOME_PAGE_URL_KEY, "http://homepage:1000/")
            .with_metadata(HEALTH_CHECK_URL_KEY, "http://homepage:1000/admin/health");
        assert_eq!(
            MetadataUriResolver.resolve_home_page_url(&instance),
            "http://homepage:1000"
        );
        assert_eq!(
            MetadataUriResolver.resolve_health_check_url(&instance),
            "http://homepage:1000/admin/health"
        );
        assert_eq!(
            MetadataUriResolver.resolve_mappings_url(&instance),
            "http://homepage:1000/mappings"
        );
    }
}
