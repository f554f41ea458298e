//! Stripe-compatible payment network client.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{ClientSecret, PaymentConfirmation, PaymentError, PaymentMethod, PaymentNetwork};
use crate::config::PaymentConfig;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: CardError,
}

#[derive(Debug, Deserialize)]
struct CardError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
}

/// Confirms card payments against `POST /payment_intents/{id}/confirm`.
#[derive(Clone)]
pub struct StripeNetwork {
    inner: Arc<StripeNetworkInner>,
}

struct StripeNetworkInner {
    client: reqwest::Client,
    base: Url,
    publishable_key: SecretString,
}

impl StripeNetwork {
    /// Create a new payment network client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeNetworkInner {
                client,
                base: config.api_url.clone(),
                publishable_key: config.publishable_key.clone(),
            }),
        })
    }

    fn confirm_url(&self, intent_id: &str) -> Url {
        let mut url = self.inner.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["payment_intents", intent_id, "confirm"]);
        }
        url
    }
}

#[async_trait]
impl PaymentNetwork for StripeNetwork {
    #[instrument(skip(self, secret), fields(payment_intent_id = secret.intent_id()))]
    async fn confirm_card_payment(
        &self,
        secret: &ClientSecret,
        method: &PaymentMethod,
    ) -> Result<PaymentConfirmation, PaymentError> {
        let intent_id = secret.intent_id().ok_or(PaymentError::InvalidClientSecret)?;

        let response = self
            .inner
            .client
            .post(self.confirm_url(intent_id))
            .bearer_auth(self.inner.publishable_key.expose_secret())
            .form(&[
                ("payment_method", method.as_str()),
                ("client_secret", secret.expose()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let CardError {
                        message,
                        code,
                        decline_code,
                    } = envelope.error;
                    debug!(?code, ?decline_code, "Payment declined");
                    Err(PaymentError::Declined {
                        message: message.unwrap_or_else(|| "Your payment was declined.".to_string()),
                        code,
                        decline_code,
                    })
                }
                Err(_) => {
                    tracing::error!(
                        status = %status,
                        body = %body.chars().take(500).collect::<String>(),
                        "Payment network returned non-success status"
                    );
                    Err(PaymentError::Status(status.as_u16()))
                }
            };
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse payment confirmation"
            );
            PaymentError::Parse(e)
        })
    }
}
