use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed lifetime of a cached aggregate, in milliseconds (10 minutes).
pub const CACHE_TTL_MILLIS: i64 = 10 * 60 * 1000;

/// Persisted shape of one cached aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub value: Value,
    /// Milliseconds since the Unix epoch.
    pub stored_at: i64,
}

impl CacheEntry {
    #[must_use]
    pub fn new(value: Value, stored_at: i64) -> Self {
        Self { value, stored_at }
    }

    /// Expired strictly after the TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis.saturating_sub(self.stored_at) > CACHE_TTL_MILLIS
    }

    /// Decode a stored entry; `None` for anything that does not parse.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` if the value cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
