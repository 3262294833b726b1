//! In-memory logged-in session.

use super::{Credential, Principal, Token};

/// A credential paired with the principal it was issued to.
///
/// At most one exists per [`AuthManager`](crate::AuthManager); callers get
/// clones, so holding one never keeps a logged-out session alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    credential: Credential,
    principal: Principal,
}

impl Session {
    pub fn new(credential: Credential, principal: Principal) -> Self {
        Self {
            credential,
            principal,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Shorthand for the bearer token.
    pub fn token(&self) -> &Token {
        self.credential.token()
    }

    /// Replace the credential after a refresh, keeping the principal
    /// unless the backend sent an updated one.
    pub(crate) fn renew(&mut self, credential: Credential, principal: Option<Principal>) {
        self.credential = credential;
        if let Some(principal) = principal {
            self.principal = principal;
        }
    }
}
