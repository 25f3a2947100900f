// SPDX-License-Identifier: Apache-2.0

use tracing::warn;

use super::{
    InboundCredential, OutboundSecurityStrategy, FORWARD_INBOUND_AUTH_HEADER,
    FORWARD_OAUTH2_TOKEN, NONE_STRATEGY,
};
use crate::caller::OutboundRequest;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStrategy;

impl OutboundSecurityStrategy for NoopStrategy {
    fn strategy_type(&self) -> &'static str {
        NONE_STRATEGY
    }

    fn apply(&self, _request: &mut OutboundRequest, _credential: Option<&InboundCredential>) {}
}

/// Copies the inbound `Authorization` header verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardInboundAuthHeader;

impl OutboundSecurityStrategy for ForwardInboundAuthHeader {
    fn strategy_type(&self) -> &'static str {
        FORWARD_INBOUND_AUTH_HEADER
    }

    fn apply(&self, request: &mut OutboundRequest, credential: Option<&InboundCredential>) {
        match credential {
            Some(cred) => {
                if !request.set_authorization(cred.authorization()) {
                    warn!(url = %request.url, "inbound authorization header is not forwardable");
                }
            }
            None => warn!(url = %request.url, "no inbound authorization header to forward"),
        }
    }
}

/// Re-issues the caller's token as `<type> <token>`, defaulting the type.
#[derive(Debug, Clone)]
pub struct ForwardOAuth2Token {
    default_token_type: String,
}

impl Default for ForwardOAuth2Token {
    fn default() -> Self {
        Self {
            default_token_type: "Bearer".to_string(),
        }
    }
}

impl OutboundSecurityStrategy for ForwardOAuth2Token {
    fn strategy_type(&self) -> &'static str {
        FORWARD_OAUTH2_TOKEN
    }

    fn apply(&self, request: &mut OutboundRequest, credential: Option<&InboundCredential>) {
        let Some(cred) = credential else {
            warn!(url = %request.url, "no oauth2 token available to forward");
            return;
        };
        let (kind, token) = cred.token_parts();
        let value = format!("{} {token}", kind.unwrap_or(&self.default_token_type));
        if !request.set_authorization(&value) {
            warn!(url = %request.url, "oauth2 token is not a valid header value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorization(request: &OutboundRequest) -> Option<&str> {
        request
            .headers
            .get(reqwest::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }

    #[test]
    fn forward_header_copies_inbound_value() {
        let cred = InboundCredential::from_authorization("Basic dXNlcjpwdw==");
        let mut request = OutboundRequest::new("http://svc/health");
        ForwardInboundAuthHeader.apply(&mut request, cred.as_ref());
        assert_eq!(authorization(&request), Some("Basic dXNlcjpwdw=="));

        let mut bare = OutboundRequest::new("http://svc/health");
        ForwardInboundAuthHeader.apply(&mut bare, None);
        assert_eq!(authorization(&bare), None);
    }

    #[test]
    fn oauth2_defaults_token_type() {
        let strategy = ForwardOAuth2Token::default();
        let mut request = OutboundRequest::new("http://svc/mappings");
        strategy.apply(
            &mut request,
            InboundCredential::from_authorization("tok-123").as_ref(),
        );
        assert_eq!(authorization(&request), Some("Bearer tok-123"));

        let mut typed = OutboundRequest::new("http://svc/mappings");
        strategy.apply(
            &mut typed,
            InboundCredential::from_authorization("MAC tok-9").as_ref(),
        );
        assert_eq!(authorization(&typed), Some("MAC tok-9"));
    }

    #[test]
    fn noop_leaves_request_alone() {
        let mut request = OutboundRequest::new("http://svc/");
        NoopStrategy.apply(
            &mut request,
            InboundCredential::from_authorization("Bearer x").as_ref(),
        );
        assert!(request.headers.is_empty());
    }
}
