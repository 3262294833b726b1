//! Durable key-value storage trait.

use async_trait::async_trait;

use crate::Result;

/// String key-value storage that outlives the process.
///
/// Errors are reported as [`Error::Storage`](crate::Error::Storage); the
/// [`SessionStore`](crate::SessionStore) layered on top decides which of
/// them are fatal (none are).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value, `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any existing one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
