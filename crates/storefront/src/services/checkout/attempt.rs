//! Checkout attempt bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clickcart_core::{OrderId, ProductId, Quantity};

use crate::models::{CartItem, Order};
use crate::payment::PaymentMethod;

/// Where a checkout attempt is in the payment/order protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    #[default]
    Idle,
    IntentRequested,
    IntentReady,
    PaymentSubmitted,
    PaymentConfirmed,
    OrderCreated,
    IntentFailed,
    PaymentFailed,
    /// The charge succeeded but no order was recorded.
    OrderCreationFailed,
}

impl CheckoutState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::IntentRequested => "INTENT_REQUESTED",
            Self::IntentReady => "INTENT_READY",
            Self::PaymentSubmitted => "PAYMENT_SUBMITTED",
            Self::PaymentConfirmed => "PAYMENT_CONFIRMED",
            Self::OrderCreated => "ORDER_CREATED",
            Self::IntentFailed => "INTENT_FAILED",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::OrderCreationFailed => "ORDER_CREATION_FAILED",
        }
    }

    /// Whether the attempt has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::OrderCreated | Self::IntentFailed | Self::PaymentFailed | Self::OrderCreationFailed
        )
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for one checkout submission.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_method: PaymentMethod,
}

/// Snapshot of the most recent checkout attempt.
///
/// Holds no client secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutAttempt {
    pub attempt_id: Uuid,
    pub state: CheckoutState,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_intent_id: Option<String>,
    pub payment_confirmed: bool,
    pub order_created: bool,
    pub order_id: Option<OrderId>,
    /// Cart revision when the attempt started.
    pub cart_revision: u64,
    pub started_at: DateTime<Utc>,
}

impl CheckoutAttempt {
    pub(crate) fn new(item: &CartItem, request: &CheckoutRequest, cart_revision: u64) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            state: CheckoutState::Idle,
            product_id: item.product_id,
            product_name: item.name.clone(),
            quantity: item.quantity,
            shipping_address: request.shipping_address.trim().to_string(),
            billing_address: request.billing_address.trim().to_string(),
            payment_intent_id: None,
            payment_confirmed: false,
            order_created: false,
            order_id: None,
            cart_revision,
            started_at: Utc::now(),
        }
    }
}

/// Returned by a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub attempt_id: Uuid,
    pub order: Order,
    pub payment_intent_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!CheckoutState::Idle.is_terminal());
        assert!(!CheckoutState::PaymentConfirmed.is_terminal());
        assert!(CheckoutState::OrderCreated.is_terminal());
        assert!(CheckoutState::OrderCreationFailed.is_terminal());
    }

    #[test]
    fn test_state_serializes_like_display() {
        for state in [
            CheckoutState::IntentReady,
            CheckoutState::OrderCreationFailed,
        ] {
            assert_eq!(
                serde_json::to_value(state).ok(),
                Some(serde_json::Value::String(state.to_string()))
            );
        }
    }
}
