//! Backend base URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use pulseauth_core::Error;
use pulseauth_core::error::InvalidInputError;

/// A validated backend base URL.
///
/// Absolute, HTTPS (plain HTTP only for loopback hosts), with any trailing
/// slash dropped so endpoint paths join cleanly. A path prefix such as
/// `/api` is kept.
///
/// # Example
///
/// ```
/// use pulseauth_http::ApiUrl;
///
/// let api = ApiUrl::new("https://coach.example.com/api/").unwrap();
/// assert_eq!(api.endpoint("auth/login"), "https://coach.example.com/api/auth/login");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiUrl(Url);

impl ApiUrl {
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| invalid(s, e.to_string()))?;

        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid(s, "must be an absolute URL with a host"));
        }

        let loopback = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");
        match url.scheme() {
            "https" => {}
            "http" if loopback => {}
            _ => return Err(invalid(s, "must use HTTPS (HTTP allowed only for localhost)")),
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid(s, "must not carry a query or fragment"));
        }

        Ok(Self(url))
    }

    /// Full URL of an endpoint below the base.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }
}

fn invalid(value: &str, reason: impl Into<String>) -> Error {
    InvalidInputError::ApiUrl {
        value: value.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

impl FromStr for ApiUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApiUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ApiUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ApiUrl::new(&s).map_err(serde::de::Error::custom)
    }
}
