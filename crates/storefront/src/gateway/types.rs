//! Request and response bodies for the backend's auth and payment endpoints.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use clickcart_core::ProductId;

use crate::models::ProfilePayload;
use crate::payment::ClientSecret;

/// Sign-in response fields that may carry the session token, in precedence
/// order. The first non-blank string wins.
pub const TOKEN_FIELDS: [&str; 3] = ["accessToken", "token", "access_token"];

/// Body for `POST /payment/create-payment-intent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    pub shipping_address: String,
    pub billing_address: String,
}

/// Response from `POST /payment/create-payment-intent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: ClientSecret,
    /// Provisional intent id; the payment network's confirmation result takes
    /// precedence when it carries one.
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Body for `POST /payment/confirm-and-create-order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_intent_id: String,
}

impl OrderRequest {
    /// Build the order request for a confirmed intent.
    #[must_use]
    pub fn for_intent(intent: &PaymentIntentRequest, payment_intent_id: String) -> Self {
        Self {
            product_id: intent.product_id,
            quantity: intent.quantity,
            shipping_address: intent.shipping_address.clone(),
            billing_address: intent.billing_address.clone(),
            payment_intent_id,
        }
    }
}

/// A decoded sign-in response.
#[derive(Debug)]
pub struct SignInResponse {
    pub token: SecretString,
    pub profile: ProfilePayload,
}

impl SignInResponse {
    /// First non-blank token among [`TOKEN_FIELDS`].
    #[must_use]
    pub fn find_token(body: &Map<String, Value>) -> Option<SecretString> {
        TOKEN_FIELDS.iter().find_map(|field| {
            body.get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(SecretString::from)
        })
    }

    /// Split a raw sign-in body into token and profile.
    ///
    /// Returns `Ok(None)` when no token field is usable. Token fields and
    /// `tokenType`/`type` are not part of the profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the remaining fields do not form a profile.
    pub fn from_body(mut body: Map<String, Value>) -> Result<Option<Self>, serde_json::Error> {
        let Some(token) = Self::find_token(&body) else {
            return Ok(None);
        };

        for field in TOKEN_FIELDS.iter().chain(&["tokenType", "type"]) {
            body.remove(*field);
        }
        let profile = serde_json::from_value(Value::Object(body))?;

        Ok(Some(Self { token, profile }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;
    use serde_json::json;

    use super::*;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_access_token_without_token() {
        let parsed = SignInResponse::from_body(body(json!({
            "accessToken": "jwt-a",
            "id": 1,
            "username": "ada",
            "roles": ["ROLE_USER"]
        })))
        .unwrap()
        .unwrap();

        assert_eq!(parsed.token.expose_secret(), "jwt-a");
        assert_eq!(parsed.profile.username, "ada");
    }

    #[test]
    fn test_precedence_and_blank_values() {
        let token = SignInResponse::find_token(&body(json!({
            "accessToken": "   ",
            "token": "jwt-t",
            "access_token": "jwt-u"
        })))
        .unwrap();
        assert_eq!(token.expose_secret(), "jwt-t");

        let token = SignInResponse::find_token(&body(json!({
            "token": "jwt-t",
            "accessToken": "jwt-a"
        })))
        .unwrap();
        assert_eq!(token.expose_secret(), "jwt-a");
    }

    #[test]
    fn test_no_token_field() {
        let parsed = SignInResponse::from_body(body(json!({
            "id": 1,
            "username": "ada",
            "tokenType": "Bearer",
            "token": ""
        })))
        .unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_jwt_response_shape() {
        let parsed = SignInResponse::from_body(body(json!({
            "token": "jwt-t",
            "type": "Bearer",
            "id": 7,
            "username": "admin",
            "email": "admin@example.com",
            "firstName": "Site",
            "lastName": "Admin",
            "roles": ["ROLE_ADMIN", "ROLE_USER"]
        })))
        .unwrap()
        .unwrap();

        let profile = parsed.profile.into_profile();
        assert!(profile.has_role(&clickcart_core::Role::Admin));
    }

    #[test]
    fn test_order_request_wire_shape() {
        let intent = PaymentIntentRequest {
            product_id: ProductId::new(5),
            quantity: 2,
            shipping_address: "1 Main St".to_string(),
            billing_address: "1 Main St".to_string(),
        };
        let order = OrderRequest::for_intent(&intent, "pi_123".to_string());
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            json!({
                "productId": 5,
                "quantity": 2,
                "shippingAddress": "1 Main St",
                "billingAddress": "1 Main St",
                "paymentIntentId": "pi_123"
            })
        );
    }
}
