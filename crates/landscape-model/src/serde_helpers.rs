// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Deserializer};

/// Accepts an explicit JSON `null` wherever a collection field is expected and
/// substitutes the empty value, so set fields are never absent after decoding.
pub mod null_as_default {
    use super::*;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Lanes arrive from stored documents as numbers; anything outside `0..=3`
/// is treated as unset and re-derived from the node type later.
pub mod lenient_lane {
    use super::*;
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_u64)
            .filter(|lane| *lane <= u64::from(crate::MAX_LANE))
            .and_then(|lane| u8::try_from(lane).ok()))
    }
}
