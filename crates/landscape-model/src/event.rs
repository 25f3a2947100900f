// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Warning,
    Error,
}

impl EventLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl Display for EventLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic record published whenever a unit of aggregation work is skipped.
///
/// `node_id` is set when the failure belongs to one service; system-wide
/// failures leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEvent {
    pub level: EventLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl SystemEvent {
    #[must_use]
    pub fn system(level: EventLevel, message: impl Into<String>, cause: Option<String>) -> Self {
        Self {
            level,
            message: message.into(),
            node_id: None,
            cause,
        }
    }

    #[must_use]
    pub fn node(
        level: EventLevel,
        node_id: impl Into<String>,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            node_id: Some(node_id.into()),
            cause,
        }
    }
}
