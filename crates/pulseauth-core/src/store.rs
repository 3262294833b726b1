//! Best-effort persistence of the session record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StorageKeys;
use crate::traits::Storage;
use crate::types::{Principal, SessionRecord, Token};

/// On-disk shape of the current single-record layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    token: Token,
    user: Principal,
    /// Epoch milliseconds.
    expires_at: i64,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issued_at: Option<i64>,
}

/// Reads and writes the [`SessionRecord`] through a [`Storage`] backend.
///
/// Every operation swallows storage failures: they are logged and treated
/// as "no session", so a broken backend can never abort startup.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    keys: StorageKeys,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>, keys: StorageKeys) -> Self {
        Self { storage, keys }
    }

    /// Persist `record` under the current key.
    ///
    /// Records without an expiry cannot be written in the current layout
    /// and are skipped. Legacy keys are dropped after a successful write.
    pub async fn save(&self, record: &SessionRecord) {
        let Some(expires_at) = record.expires_at else {
            debug!("Not persisting record without expiry");
            return;
        };

        let stored = StoredSession {
            token: record.token.clone(),
            user: record.principal.clone(),
            expires_at: expires_at.timestamp_millis(),
            issued_at: record.issued_at.map(|t| t.timestamp_millis()),
        };

        let json = match serde_json::to_string(&stored) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session record");
                return;
            }
        };

        if let Err(e) = self.storage.set(&self.keys.session, &json).await {
            warn!(error = %e, "Failed to persist session record");
            return;
        }

        self.discard_legacy().await;
        debug!(user = %record.principal.username(), "Session record persisted");
    }

    /// Load the persisted record, if any can be trusted.
    ///
    /// Returns `None` for a missing entry, unparseable JSON, or a record
    /// that fails shape validation. Invalid entries are removed from
    /// storage. Staleness is not judged here.
    pub async fn load(&self) -> Option<SessionRecord> {
        let Some(raw) = self.read(&self.keys.session).await else {
            return self.load_legacy().await;
        };

        let record = Self::parse_current(&raw);
        if record.is_none() {
            self.remove_quietly(&self.keys.session).await;
        }
        record
    }

    /// Remove the current record and any legacy entries.
    pub async fn clear(&self) {
        self.remove_quietly(&self.keys.session).await;
        self.discard_legacy().await;
        debug!("Session storage cleared");
    }

    fn parse_current(raw: &str) -> Option<SessionRecord> {
        let stored: StoredSession = match serde_json::from_str(raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Discarding invalid session record");
                return None;
            }
        };

        let Some(expires_at) = from_millis(stored.expires_at) else {
            warn!(expires_at = stored.expires_at, "Discarding session record with out-of-range expiry");
            return None;
        };

        Some(SessionRecord {
            token: stored.token,
            principal: stored.user,
            issued_at: stored.issued_at.and_then(from_millis),
            expires_at: Some(expires_at),
        })
    }

    async fn load_legacy(&self) -> Option<SessionRecord> {
        let raw_token = self.read(&self.keys.legacy_token).await?;
        let raw_user = self.read(&self.keys.legacy_user).await?;

        let token = match Token::new(legacy_token_value(&raw_token)) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Discarding legacy session with invalid token");
                self.discard_legacy().await;
                return None;
            }
        };

        let principal: Principal = match serde_json::from_str(&raw_user) {
            Ok(principal) => principal,
            Err(e) => {
                warn!(error = %e, "Discarding legacy session with invalid user");
                self.discard_legacy().await;
                return None;
            }
        };

        debug!(user = %principal.username(), "Restored legacy session layout");
        Some(SessionRecord::legacy(token, principal))
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read session storage");
                None
            }
        }
    }

    async fn discard_legacy(&self) {
        self.remove_quietly(&self.keys.legacy_token).await;
        self.remove_quietly(&self.keys.legacy_user).await;
    }

    async fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.storage.remove(key).await {
            warn!(key, error = %e, "Failed to remove session storage entry");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Legacy tokens were stored either raw or as a JSON string.
fn legacy_token_value(raw: &str) -> String {
    serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string())
}
