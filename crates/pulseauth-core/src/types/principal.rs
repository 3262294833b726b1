//! Authenticated identity.

use std::collections::BTreeSet;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Role name that grants administrative access.
pub const ADMIN_ROLE: &str = "admin";

/// The user a credential was issued to.
///
/// Backends disagree on the exact user shape, so deserialization accepts
/// `id` as a string or a number and either a `roles` array or a single
/// `role` string. Fields this type does not model are kept and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    id: String,
    username: String,
    email: Option<String>,
    roles: BTreeSet<String>,
    extra: Map<String, Value>,
}

impl Principal {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            roles: BTreeSet::new(),
            extra: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Derived from the role set; never stored independently.
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Fields carried by the backend that this type does not interpret.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct WirePrincipal {
    id: WireId,
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WirePrincipal::deserialize(deserializer)?;

        let id = match wire.id {
            WireId::Text(s) => s,
            WireId::Number(n) => n.to_string(),
        };
        if id.is_empty() {
            return Err(serde::de::Error::custom("principal id must not be empty"));
        }

        let mut roles: BTreeSet<String> = wire.roles.into_iter().collect();
        if let Some(role) = wire.role {
            roles.insert(role);
        }

        let mut extra = wire.extra;
        // Derived on output, never trusted on input.
        extra.remove("isAdmin");

        Ok(Self {
            id,
            username: wire.username,
            email: wire.email,
            roles,
            extra,
        })
    }
}

impl Serialize for Principal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("username", &self.username)?;
        if let Some(ref email) = self.email {
            map.serialize_entry("email", email)?;
        }
        map.serialize_entry("roles", &self.roles)?;
        map.serialize_entry("isAdmin", &self.is_admin())?;
        map.end()
    }
}
