// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

/// Failure of one unit of aggregation work.
///
/// Only `Discovery` is allowed to escape an aggregator; everything else is
/// turned into a diagnostic event where it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AggregationError {
    Discovery(String),
    NoInstances(String),
    HttpStatus { url: String, status: u16 },
    Transport { url: String, message: String },
    Timeout { url: String, after_ms: u64 },
    MalformedPayload(String),
}

impl AggregationError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failure",
            Self::NoInstances(_) => "no_instances",
            Self::HttpStatus { .. } => "http_status",
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::MalformedPayload(_) => "malformed_payload",
        }
    }

    /// Warnings skip the unit quietly; everything else is reported as an error.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::NoInstances(_) | Self::HttpStatus { .. } | Self::Timeout { .. }
        )
    }
}

impl Display for AggregationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery(msg) => write!(f, "service discovery failed: {msg}"),
            Self::NoInstances(id) => write!(f, "no instances found for service {id}"),
            Self::HttpStatus { url, status } => write!(f, "status {status} for call {url}"),
            Self::Transport { url, message } => write!(f, "call {url} failed: {message}"),
            Self::Timeout { url, after_ms } => write!(f, "call {url} timed out after {after_ms}ms"),
            Self::MalformedPayload(msg) => write!(f, "malformed payload: {msg}"),
        }
    }
}

impl std::error::Error for AggregationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertError(pub String);

impl Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConvertError {}

impl From<ConvertError> for AggregationError {
    fn from(err: ConvertError) -> Self {
        Self::MalformedPayload(err.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    InvalidNode(String),
    NotFound(String),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidNode(_) => "invalid_node",
            Self::NotFound(_) => "not_found",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNode(msg) => write!(f, "invalid node document: {msg}"),
            Self::NotFound(id) => write!(f, "no stored node with id {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AggregationError::Discovery("x".into()).code(), "discovery_failure");
        assert_eq!(
            AggregationError::HttpStatus { url: "u".into(), status: 503 }.code(),
            "http_status"
        );
        assert_eq!(StoreError::NotFound("a".into()).code(), "not_found");
        let converted: AggregationError = ConvertError("no status".into()).into();
        assert_eq!(converted.code(), "malformed_payload");
    }

    #[test]
    fn warning_classification() {
        assert!(AggregationError::NoInstances("svc".into()).is_warning());
        assert!(AggregationError::Timeout { url: "u".into(), after_ms: 5 }.is_warning());
        assert!(!AggregationError::Transport { url: "u".into(), message: "reset".into() }
            .is_warning());
        assert!(!AggregationError::MalformedPayload("m".into()).is_warning());
    }
}
