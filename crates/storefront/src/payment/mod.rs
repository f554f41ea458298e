//! Payment Network: card confirmation against a Stripe-compatible API.
//!
//! The backend creates a payment intent and hands the client a
//! [`ClientSecret`]; the client then confirms the charge directly with the
//! payment network using a tokenized [`PaymentMethod`]. Confirmation is a
//! single attempt and is never retried automatically.

mod stripe;

pub use stripe::StripeNetwork;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the intent id and the secret part of a client secret.
const SECRET_SEPARATOR: &str = "_secret_";

/// Errors that can occur when confirming a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The payment network refused the charge (card error).
    #[error("{message}")]
    Declined {
        message: String,
        code: Option<String>,
        decline_code: Option<String>,
    },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without a card error body.
    #[error("payment network returned {0}")]
    Status(u16),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The client secret does not embed an intent id.
    #[error("client secret is not in the expected format")]
    InvalidClientSecret,
}

/// The secret the backend returns for completing one payment intent.
///
/// Never logged; `Debug` shows only the intent id.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The payment intent this secret belongs to (`pi_X_secret_Y` -> `pi_X`).
    #[must_use]
    pub fn intent_id(&self) -> Option<&str> {
        self.0
            .split_once(SECRET_SEPARATOR)
            .map(|(id, _)| id)
            .filter(|id| !id.is_empty())
    }

    /// The raw secret, for the confirmation request only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ClientSecret({}_secret_[REDACTED])",
            self.intent_id().unwrap_or("?")
        )
    }
}

/// A tokenized card, e.g. `pm_card_visa`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethod(String);

impl PaymentMethod {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a payment intent after confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresCapture,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Processing => "processing",
            Self::RequiresAction => "requires_action",
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a confirmation call the payment network accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    /// Intent id as reported by the network.
    #[serde(default, rename = "id")]
    pub payment_intent_id: Option<String>,
    pub status: IntentStatus,
}

impl PaymentConfirmation {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == IntentStatus::Succeeded
    }
}

/// Card confirmation against the payment network.
#[async_trait]
pub trait PaymentNetwork: Send + Sync {
    /// Confirm the intent behind `secret` with `method`.
    async fn confirm_card_payment(
        &self,
        secret: &ClientSecret,
        method: &PaymentMethod,
    ) -> Result<PaymentConfirmation, PaymentError>;
}
