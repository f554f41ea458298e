//! A payment that was captured without an order.
//!
//! Written through to storage under [`keys::PENDING_PAYMENT`] before the
//! order call, so a later run repeats only that call instead of charging
//! again. The record names the session that paid; it is only ever replayed
//! under that identity.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{error, warn};

use clickcart_core::UserId;

use super::CheckoutAttempt;
use crate::gateway::{Credentials, OrderRequest};
use crate::storage::{KeyValueStore, StorageError, keys};

/// Who paid.
///
/// The user id is compared when both sides know it, so signing in again
/// with a fresh token still matches. Otherwise the tokens must be equal.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaymentOwner {
    user_id: Option<UserId>,
    #[serde(serialize_with = "expose_token", deserialize_with = "conceal_token")]
    token: Option<SecretString>,
}

impl PaymentOwner {
    pub(super) fn new(credentials: &Credentials, user_id: Option<UserId>) -> Self {
        Self {
            user_id,
            token: credentials.token().cloned(),
        }
    }

    pub(super) fn matches(&self, credentials: &Credentials, user_id: Option<UserId>) -> bool {
        if let (Some(owner), Some(current)) = (self.user_id, user_id) {
            return owner == current;
        }
        match (&self.token, credentials.token()) {
            (Some(owner), Some(current)) => owner.expose_secret() == current.expose_secret(),
            _ => false,
        }
    }
}

impl std::fmt::Debug for PaymentOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOwner")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[allow(clippy::ref_option)]
fn expose_token<S: Serializer>(token: &Option<SecretString>, s: S) -> Result<S::Ok, S::Error> {
    token.as_ref().map(ExposeSecret::expose_secret).serialize(s)
}

fn conceal_token<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.map(SecretString::from))
}

/// The confirmed order request of a charged payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PendingOrder {
    pub attempt: CheckoutAttempt,
    pub request: OrderRequest,
    pub owner: PaymentOwner,
    /// The order call answered with a success status but an unreadable body.
    #[serde(default)]
    pub order_may_exist: bool,
}

impl PendingOrder {
    pub(super) fn payment_intent_id(&self) -> &str {
        &self.request.payment_intent_id
    }
}

/// Read the persisted pending payment.
///
/// An unreadable record is logged and left in place: it is the only local
/// trace of a captured payment.
pub(super) fn load(storage: &dyn KeyValueStore) -> Option<PendingOrder> {
    let raw = match storage.get(keys::PENDING_PAYMENT) {
        Ok(raw) => raw?,
        Err(e) => {
            error!(error = %e, "Failed to read pending payment");
            return None;
        }
    };

    match serde_json::from_str::<PendingOrder>(&raw) {
        Ok(pending) => {
            warn!(
                payment_intent_id = %pending.payment_intent_id(),
                "Found a payment captured without an order"
            );
            Some(pending)
        }
        Err(e) => {
            error!(error = %e, "Persisted pending payment is corrupt, ignoring it");
            None
        }
    }
}

/// Write or remove the pending payment.
pub(super) fn persist(storage: &dyn KeyValueStore, pending: Option<&PendingOrder>) {
    let result = match pending {
        Some(pending) => serde_json::to_string(pending)
            .map_err(StorageError::from)
            .and_then(|json| storage.set(keys::PENDING_PAYMENT, &json)),
        None => storage.remove(keys::PENDING_PAYMENT),
    };
    if let Err(e) = result {
        error!(
            error = %e,
            payment_intent_id = pending.map_or("", PendingOrder::payment_intent_id),
            "Failed to persist pending payment"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bearer(token: &str) -> Credentials {
        Credentials::bearer(SecretString::from(token))
    }

    #[test]
    fn test_owner_matches_same_user_with_new_token() {
        let owner = PaymentOwner::new(&bearer("jwt-old"), Some(UserId::new(7)));
        assert!(owner.matches(&bearer("jwt-new"), Some(UserId::new(7))));
        assert!(!owner.matches(&bearer("jwt-old"), Some(UserId::new(8))));
    }

    #[test]
    fn test_owner_falls_back_to_token() {
        let owner = PaymentOwner::new(&bearer("jwt-a"), None);
        assert!(owner.matches(&bearer("jwt-a"), Some(UserId::new(7))));
        assert!(!owner.matches(&bearer("jwt-b"), None));
        assert!(!owner.matches(&Credentials::anonymous(), None));
    }

    #[test]
    fn test_owner_survives_serialization_and_stays_redacted() {
        let owner = PaymentOwner::new(&bearer("jwt-a"), Some(UserId::new(3)));
        let json = serde_json::to_string(&owner).unwrap();
        let restored: PaymentOwner = serde_json::from_str(&json).unwrap();

        assert!(restored.matches(&bearer("jwt-a"), None));
        assert!(!format!("{restored:?}").contains("jwt-a"));
    }
}
