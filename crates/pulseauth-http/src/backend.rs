//! [`BackendClient`] over HTTP.

use async_trait::async_trait;
use tracing::instrument;

use pulseauth_core::{
    AuthGrant, BackendClient, Error, LoginCredentials, Result, Token, Verified,
};

use crate::api_url::ApiUrl;
use crate::client::HttpClient;
use crate::endpoints::{self, LoginRequest};
use crate::envelope::{self, Payload};

/// The auth backend reached over HTTP.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pulseauth_core::{AuthManager, MemoryStorage, SessionConfig};
/// use pulseauth_http::{ApiUrl, HttpBackend};
///
/// # fn example() -> Result<(), pulseauth_core::Error> {
/// let backend = HttpBackend::new(ApiUrl::new("https://coach.example.com/api")?)?;
/// let manager = AuthManager::new(
///     Arc::new(backend),
///     Arc::new(MemoryStorage::new()),
///     SessionConfig::default(),
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: HttpClient,
}

impl HttpBackend {
    pub fn new(api: ApiUrl) -> Result<Self> {
        Ok(Self::from_client(HttpClient::new(api)?))
    }

    pub fn from_client(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn api(&self) -> &ApiUrl {
        self.client.api()
    }
}

fn grant(payload: Payload, operation: &str) -> Result<AuthGrant> {
    let token = payload
        .token
        .ok_or_else(|| Error::malformed(format!("{operation} response has no token")))?;
    Ok(AuthGrant {
        token,
        expires_in: payload.expires_in,
        principal: payload.principal,
    })
}

#[async_trait]
impl BackendClient for HttpBackend {
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthGrant> {
        let request = LoginRequest {
            username: credentials.username(),
            password: credentials.password(),
        };
        let body = self.client.post_json(endpoints::LOGIN, &request).await?;
        grant(envelope::decode(&body)?, "login")
    }

    #[instrument(skip_all)]
    async fn verify(&self, token: &Token) -> Result<Verified> {
        let body = self.client.get_authed(endpoints::VERIFY, token).await?;
        let payload = envelope::decode(&body)?;
        let principal = payload
            .principal
            .ok_or_else(|| Error::malformed("verify response has no user"))?;
        Ok(Verified {
            principal,
            expires_in: payload.expires_in,
        })
    }

    #[instrument(skip_all)]
    async fn refresh(&self, token: &Token) -> Result<AuthGrant> {
        let body = self.client.post_authed(endpoints::REFRESH, token).await?;
        grant(envelope::decode(&body)?, "refresh")
    }
}
