//! Session lifecycle configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage keys for the current and legacy session layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageKeys {
    /// Key holding the single-record session.
    pub session: String,
    /// Legacy key holding the bare token.
    pub legacy_token: String,
    /// Legacy key holding the user object.
    pub legacy_user: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            session: "session".to_string(),
            legacy_token: "token".to_string(),
            legacy_user: "user".to_string(),
        }
    }
}

/// Timing and storage parameters for an [`AuthManager`](crate::AuthManager).
///
/// Durations are (de)serialized as integer milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// How long before expiry the refresh timer fires.
    #[serde(rename = "leadTimeMs", with = "millis")]
    pub lead_time: Duration,

    /// Retries after the first failed startup verification.
    pub verify_retries: u32,

    /// Linear backoff base: retry `n` waits `verify_base_delay * n`.
    #[serde(rename = "verifyBaseDelayMs", with = "millis")]
    pub verify_base_delay: Duration,

    /// Lifetime assumed when the backend does not report one.
    #[serde(rename = "defaultTtlMs", with = "millis")]
    pub default_ttl: Duration,

    pub keys: StorageKeys,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lead_time: Duration::from_secs(5 * 60),
            verify_retries: 3,
            verify_base_delay: Duration::from_secs(1),
            default_ttl: Duration::from_secs(60 * 60),
            keys: StorageKeys::default(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
