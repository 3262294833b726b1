//! Response envelope decoding.
//!
//! The backend answers in one of two shapes:
//!
//! ```text
//! {"code": 1, "info": "ok", "data": {"token": "...", "user": {...}, "expiresIn": 3600000}}
//! {"token": "...", "user": {...}}
//! ```
//!
//! The shape is picked by inspecting the body; both decode to a [`Payload`].
//! An enveloped body with `code != 1` is a [`Error::Rejected`].

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use pulseauth_core::{Error, Principal, Result, Token};

/// Envelope code that marks success.
pub const SUCCESS_CODE: i64 = 1;

/// The fields the session lifecycle reads from any response.
#[derive(Debug, Default)]
pub struct Payload {
    pub token: Option<Token>,
    pub principal: Option<Principal>,
    pub expires_in: Option<Duration>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<Principal>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Decode a success-status response body.
pub fn decode(body: &Value) -> Result<Payload> {
    let Some(object) = body.as_object() else {
        return Err(Error::malformed("response body is not an object"));
    };

    if object.contains_key("code") {
        return decode_enveloped(object);
    }
    if object.contains_key("token") || object.contains_key("user") {
        return payload(body);
    }
    Err(Error::malformed(
        "response is neither enveloped nor carries token/user",
    ))
}

fn decode_enveloped(object: &Map<String, Value>) -> Result<Payload> {
    let code = object
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::malformed("envelope code is not an integer"))?;

    if code != SUCCESS_CODE {
        return Err(Error::Rejected {
            code,
            info: message(object).unwrap_or_default(),
        });
    }

    match object.get("data") {
        Some(data @ Value::Object(_)) => payload(data),
        Some(Value::Null) | None => Ok(Payload::default()),
        Some(_) => Err(Error::malformed("envelope data is not an object")),
    }
}

fn payload(value: &Value) -> Result<Payload> {
    let wire = WirePayload::deserialize(value).map_err(|e| Error::malformed(e.to_string()))?;

    let token = wire
        .token
        .map(Token::new)
        .transpose()
        .map_err(|_| Error::malformed("token is empty"))?;

    Ok(Payload {
        token,
        principal: wire.user,
        expires_in: wire.expires_in.map(Duration::from_millis),
    })
}

/// Best-effort human-readable message from an error body of either shape.
pub fn error_message(body: &Value) -> Option<String> {
    body.as_object().and_then(message)
}

fn message(object: &Map<String, Value>) -> Option<String> {
    ["info", "message", "error"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
