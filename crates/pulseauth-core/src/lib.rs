//! pulseauth-core - Session types and credential lifecycle.
//!
//! This crate owns the client-side session for a single bearer credential:
//! persisting it, restoring it at startup, verifying it with bounded retries,
//! and refreshing it shortly before it expires. All of it is driven through
//! an [`AuthManager`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulseauth_core::{AuthManager, BackendClient, LoginCredentials, MemoryStorage, SessionConfig};
//!
//! # async fn example(backend: Arc<dyn BackendClient>) -> Result<(), pulseauth_core::Error> {
//! let manager = AuthManager::new(backend, Arc::new(MemoryStorage::new()), SessionConfig::default());
//! manager.restore().await;
//!
//! let session = manager.login(LoginCredentials::new("alice", "pw")).await?;
//! println!("Logged in as {}", session.principal().username());
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod store;
pub mod traits;
pub mod types;

pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{SessionConfig, StorageKeys};
pub use error::Error;
pub use lifecycle::{AuthManager, AuthState, RefreshScheduler, RetryingVerifier, VerifyOutcome};
pub use memory::MemoryStorage;
pub use store::SessionStore;
pub use traits::{AuthGrant, BackendClient, Storage, Verified};
pub use types::{Credential, LoginCredentials, Principal, Session, SessionRecord, Token};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
