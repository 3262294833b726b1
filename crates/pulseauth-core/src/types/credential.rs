//! Bearer credential with issue and expiry times.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::Token;
use crate::error::{Error, InvalidInputError};

/// A bearer token plus the window in which it is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: Token,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential, requiring `expires_at > issued_at`.
    pub fn new(
        token: Token,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if expires_at <= issued_at {
            return Err(InvalidInputError::Other {
                message: format!("credential expires ({expires_at}) before it was issued ({issued_at})"),
            }
            .into());
        }
        Ok(Self {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Create a credential issued at `issued_at` that lives for `ttl`.
    pub fn with_lifetime(token: Token, issued_at: DateTime<Utc>, ttl: Duration) -> Result<Self, Error> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| InvalidInputError::Other {
            message: format!("credential lifetime out of range: {e}"),
        })?;
        Self::new(token, issued_at, issued_at + ttl)
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the credential expires within `lead` of `now` (or already has).
    pub fn expires_within(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        self.remaining(now) <= lead
    }
}
