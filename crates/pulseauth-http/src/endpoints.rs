//! Endpoint paths and request bodies.

use serde::Serialize;

/// `POST`, body [`LoginRequest`].
pub const LOGIN: &str = "auth/login";

/// `GET`, bearer token.
pub const VERIFY: &str = "auth/verify";

/// `POST`, bearer token, no body.
pub const REFRESH: &str = "auth/refresh";

/// Request body for [`LOGIN`].
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}
