//! Auth backend trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::types::{LoginCredentials, Principal, Token};

/// A successful login or refresh, normalized across response envelopes.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    /// The newly issued bearer token.
    pub token: Token,
    /// Lifetime reported by the backend, if any.
    pub expires_in: Option<Duration>,
    /// The principal, required for login and optional for refresh.
    pub principal: Option<Principal>,
}

/// A successful verification of an existing token.
#[derive(Debug, Clone)]
pub struct Verified {
    pub principal: Principal,
    /// Remaining lifetime of the verified token, if the backend reports it.
    pub expires_in: Option<Duration>,
}

/// The three remote operations the session lifecycle depends on.
///
/// Implementations map transport failures to [`Error::Transport`],
/// 401/403 to [`Error::AuthInvalid`] and unrecognized bodies to
/// [`Error::MalformedResponse`].
///
/// [`Error::Transport`]: crate::Error::Transport
/// [`Error::AuthInvalid`]: crate::Error::AuthInvalid
/// [`Error::MalformedResponse`]: crate::Error::MalformedResponse
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Exchange a username and password for a credential.
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthGrant>;

    /// Check that `token` is still accepted and fetch its principal.
    async fn verify(&self, token: &Token) -> Result<Verified>;

    /// Exchange `token` for a fresh one.
    async fn refresh(&self, token: &Token) -> Result<AuthGrant>;
}
