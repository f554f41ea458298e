//! User domain types.
//!
//! [`ProfilePayload`] is the loose wire shape the backend returns from both
//! `/auth/signin` and `/user/profile`; [`UserProfile`] is the validated domain
//! type with canonical roles.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use clickcart_core::{Role, RoleSet, UserId, parse_roles};

/// The signed-in user's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Backend user ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Canonical roles.
    #[serde(default)]
    pub roles: RoleSet,
}

impl UserProfile {
    /// Whether the user carries `role`.
    #[must_use]
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Full name if either part is known, otherwise the username.
    #[must_use]
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Profile fields as the backend sends them.
///
/// `roles` is kept as raw JSON because the backend sends either strings or
/// role objects; it is normalized in [`ProfilePayload::into_profile`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<Value>>,
}

impl ProfilePayload {
    /// Convert into a [`UserProfile`], normalizing roles.
    ///
    /// Role entries with an unrecognised shape are dropped and logged.
    #[must_use]
    pub fn into_profile(self) -> UserProfile {
        let (roles, rejected) = parse_roles(self.roles.as_deref().unwrap_or_default());
        if !rejected.is_empty() {
            tracing::warn!(
                user_id = %self.id,
                rejected = ?rejected,
                "Ignoring role entries with unrecognised shape"
            );
        }

        UserProfile {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            roles,
        }
    }
}

/// Sign-in request body.
#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest {
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
}

/// Sign-up request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Profile update request body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_payload_with_role_objects() {
        let payload: ProfilePayload = serde_json::from_value(json!({
            "id": 3,
            "username": "ada",
            "email": "ada@example.com",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "roles": [{"id": 1, "name": "USER"}, {"id": 2, "name": "ADMIN"}],
            "password": "$2a$10$hash",
            "phoneNumber": null
        }))
        .unwrap();

        let profile = payload.into_profile();
        assert!(profile.has_role(&Role::Admin));
        assert!(profile.has_role(&Role::User));
        assert_eq!(profile.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_payload_without_roles_defaults_empty() {
        let payload: ProfilePayload =
            serde_json::from_value(json!({"id": 4, "username": "bob"})).unwrap();
        let profile = payload.into_profile();
        assert!(profile.roles.is_empty());
        assert_eq!(profile.display_name(), "bob");
    }

    #[test]
    fn test_sign_in_request_exposes_password_only_on_wire() {
        let request = SignInRequest {
            username: "ada".to_string(),
            password: SecretString::from("hunter22"),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({"username": "ada", "password": "hunter22"}));
        assert!(!format!("{request:?}").contains("hunter22"));
    }

    #[test]
    fn test_sign_up_request_skips_absent_fields() {
        let request = SignUpRequest {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: SecretString::from("hunter22"),
            first_name: Some("Ada".to_string()),
            last_name: None,
            phone_number: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "username": "ada",
                "email": "ada@example.com",
                "password": "hunter22",
                "firstName": "Ada"
            })
        );
    }
}
