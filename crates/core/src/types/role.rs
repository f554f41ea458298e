//! User role tags.
//!
//! The backend reports roles in two shapes: as raw strings (`"ROLE_ADMIN"`)
//! or as role objects carrying an enum name (`{"id": 2, "name": "ADMIN"}`).
//! Both are parsed into a canonical [`Role`] here, at the boundary, so the
//! rest of the client never branches on payload shape.

use core::fmt;
use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Prefix carried exactly once by every canonical role tag.
pub const ROLE_PREFIX: &str = "ROLE_";

/// A set of canonical roles.
pub type RoleSet = BTreeSet<Role>;

/// A canonical role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// `ROLE_USER`
    User,
    /// `ROLE_ADMIN`
    Admin,
    /// Any other role, holding its canonical `ROLE_`-prefixed tag.
    Other(String),
}

impl Role {
    /// Parse a role from a raw name, with or without the `ROLE_` prefix.
    ///
    /// Names are trimmed and upper-cased. Returns `None` for names that are
    /// empty once the prefix is removed.
    ///
    /// ```
    /// use clickcart_core::Role;
    ///
    /// assert_eq!(Role::from_name("ADMIN"), Some(Role::Admin));
    /// assert_eq!(Role::from_name("ROLE_ADMIN"), Some(Role::Admin));
    /// assert_eq!(Role::from_name("role_user"), Some(Role::User));
    /// assert_eq!(Role::from_name("ROLE_"), None);
    /// ```
    #[must_use]
    pub fn from_name(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_uppercase();
        let bare = upper.strip_prefix(ROLE_PREFIX).unwrap_or(upper.as_str());
        match bare {
            "" => None,
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            other => Some(Self::Other(format!("{ROLE_PREFIX}{other}"))),
        }
    }

    /// Parse a role from one element of a backend `roles` array.
    ///
    /// Accepts a string or an object with a string `name` field. Any other
    /// shape yields `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Self::from_name(name),
            Value::Object(map) => map.get("name").and_then(Value::as_str).and_then(Self::from_name),
            _ => None,
        }
    }

    /// The canonical tag, e.g. `ROLE_ADMIN`.
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::User => "ROLE_USER",
            Self::Admin => "ROLE_ADMIN",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised role payload: {value}")))
    }
}

/// Parse a backend `roles` array into a canonical set.
///
/// Returns the parsed set and the elements that had no recognisable shape,
/// so callers can log what was dropped.
#[must_use]
pub fn parse_roles(values: &[Value]) -> (RoleSet, Vec<Value>) {
    let mut roles = RoleSet::new();
    let mut rejected = Vec::new();
    for value in values {
        match Role::from_value(value) {
            Some(role) => {
                roles.insert(role);
            }
            None => rejected.push(value.clone()),
        }
    }
    (roles, rejected)
}
