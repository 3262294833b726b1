//! HTTP client for the auth endpoints.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use pulseauth_core::error::{ProtocolError, TransportError};
use pulseauth_core::{Error, Result, Token};

use crate::api_url::ApiUrl;
use crate::envelope;

/// Request timeout used by [`HttpClient::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-over-HTTP client bound to one backend.
///
/// Returns raw JSON bodies of successful responses; status codes are mapped
/// to [`Error`] here, envelope shapes are left to [`envelope::decode`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    api: ApiUrl,
}

impl HttpClient {
    pub fn new(api: ApiUrl) -> Result<Self> {
        Self::with_timeout(api, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api: ApiUrl, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pulseauth/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(transport)?;

        Ok(Self { client, api })
    }

    pub fn api(&self) -> &ApiUrl {
        &self.api
    }

    /// Unauthenticated `POST` with a JSON body.
    #[instrument(skip(self, body), fields(api = %self.api))]
    pub async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.api.endpoint(path);
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        self.handle_response(response).await
    }

    /// Authenticated `GET`.
    #[instrument(skip(self, token), fields(api = %self.api))]
    pub async fn get_authed(&self, path: &str, token: &Token) -> Result<Value> {
        let url = self.api.endpoint(path);
        debug!(%url, "GET (authenticated)");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(transport)?;

        self.handle_response(response).await
    }

    /// Authenticated `POST` with no request body.
    #[instrument(skip(self, token), fields(api = %self.api))]
    pub async fn post_authed(&self, path: &str, token: &Token) -> Result<Value> {
        let url = self.api.endpoint(path);
        debug!(%url, "POST (authenticated)");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(transport)?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        trace!(%status, "response");

        let bytes = response.bytes().await.map_err(transport)?;
        let body = serde_json::from_slice::<Value>(&bytes);

        if status.is_success() {
            return body.map_err(|e| Error::malformed(format!("invalid JSON body: {e}")));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::AuthInvalid {
                status: status.as_u16(),
            });
        }

        let message = body.ok().as_ref().and_then(envelope::error_message);
        Err(ProtocolError::new(status.as_u16(), message).into())
    }
}

/// Map a `reqwest` failure onto the transport error kinds.
fn transport(e: reqwest::Error) -> Error {
    let error = if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connection {
            message: e.to_string(),
        }
    } else {
        TransportError::Http {
            message: e.to_string(),
        }
    };
    Error::Transport(error)
}
