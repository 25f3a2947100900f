// SPDX-License-Identifier: Apache-2.0

//! Outbound credential attachment.
//!
//! The caller's `Authorization` header is captured once at the HTTP boundary
//! as an [`InboundCredential`] and handed down explicitly; each aggregator key
//! picks a strategy that decides what, if anything, to forward.

use axum::http::HeaderMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::caller::OutboundRequest;

mod strategies;

pub use strategies::{ForwardInboundAuthHeader, ForwardOAuth2Token, NoopStrategy};

pub const NONE_STRATEGY: &str = "none";
pub const FORWARD_INBOUND_AUTH_HEADER: &str = "forward-inbound-auth-header";
pub const FORWARD_OAUTH2_TOKEN: &str = "forward-oauth2-token";
pub const KNOWN_STRATEGIES: [&str; 3] =
    [NONE_STRATEGY, FORWARD_INBOUND_AUTH_HEADER, FORWARD_OAUTH2_TOKEN];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCredential {
    authorization: String,
}

impl InboundCredential {
    #[must_use]
    pub fn from_authorization(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            authorization: value.to_string(),
        })
    }

    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_authorization)
    }

    #[must_use]
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// `(token_type, token)`; a bare token has no type.
    #[must_use]
    pub fn token_parts(&self) -> (Option<&str>, &str) {
        match self.authorization.split_once(' ') {
            Some((kind, token)) if !token.trim().is_empty() => (Some(kind), token.trim()),
            _ => (None, self.authorization.as_str()),
        }
    }
}

pub trait OutboundSecurityStrategy: Send + Sync {
    fn strategy_type(&self) -> &'static str;
    fn apply(&self, request: &mut OutboundRequest, credential: Option<&InboundCredential>);
}

fn strategy_by_name(name: &str) -> Option<Arc<dyn OutboundSecurityStrategy>> {
    match name {
        NONE_STRATEGY => Some(Arc::new(NoopStrategy)),
        FORWARD_INBOUND_AUTH_HEADER => Some(Arc::new(ForwardInboundAuthHeader)),
        FORWARD_OAUTH2_TOKEN => Some(Arc::new(ForwardOAuth2Token::default())),
        _ => None,
    }
}

/// Aggregator key to strategy lookup. Keys without a configured strategy get
/// the no-op one.
#[derive(Clone)]
pub struct SecurityStrategyFactory {
    by_key: HashMap<String, Arc<dyn OutboundSecurityStrategy>>,
    fallback: Arc<dyn OutboundSecurityStrategy>,
}

impl Default for SecurityStrategyFactory {
    fn default() -> Self {
        Self {
            by_key: HashMap::new(),
            fallback: Arc::new(NoopStrategy),
        }
    }
}

impl SecurityStrategyFactory {
    pub fn new(assignments: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut by_key = HashMap::new();
        for (key, name) in assignments {
            let strategy = strategy_by_name(name)
                .ok_or_else(|| format!("unknown security strategy `{name}` for {key}"))?;
            by_key.insert(key.clone(), strategy);
        }
        Ok(Self {
            by_key,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn strategy_for(&self, aggregator_key: &str) -> Arc<dyn OutboundSecurityStrategy> {
        self.by_key
            .get(aggregator_key)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}
