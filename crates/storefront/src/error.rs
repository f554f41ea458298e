//! Unified error handling with Sentry integration.
//!
//! Every layer has its own `thiserror` enum (`GatewayError`, `PaymentError`,
//! `StorageError`, `ConfigError`). Failures that reach a caller of the
//! session store or checkout orchestrator are converted into [`AppError`],
//! whose variants are the error kinds a user can act on.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::payment::PaymentError;

/// Application-level error type for the commerce core.
#[derive(Debug, Error)]
pub enum AppError {
    /// Transport failure or server-side error. Retryable by user action.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend rejected the session token.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// The backend rejected the request; the message is shown verbatim.
    #[error("{0}")]
    Validation(String),

    /// Sign-in succeeded but no token field was usable.
    #[error("No token received from server")]
    NoTokenReceived,

    /// The payment network declined the card.
    #[error("{message}")]
    PaymentDeclined {
        message: String,
        code: Option<String>,
    },

    /// The charge went through but the backend did not record an order.
    #[error(
        "Payment successful but order creation failed: {message}. \
         Please contact support with payment reference {payment_intent_id}"
    )]
    PaymentSucceededOrderFailed {
        payment_intent_id: String,
        message: String,
    },

    /// A captured payment awaiting its order belongs to a different session.
    #[error(
        "A payment (reference {payment_intent_id}) made by another account is still \
         awaiting its order. Sign in as that account to complete it"
    )]
    PaymentPendingForAnotherAccount { payment_intent_id: String },

    /// Client-side stock pre-check failed.
    #[error("Quantity exceeds available stock (requested {requested}, available {available})")]
    StockExceeded { requested: u32, available: u32 },

    /// Checkout was attempted with nothing in the cart.
    #[error("Your cart is empty")]
    EmptyCart,

    /// The operation needs a signed-in session.
    #[error("Please sign in to continue")]
    NotSignedIn,

    /// Another checkout attempt is still running.
    #[error("A checkout is already in progress")]
    CheckoutInProgress,

    /// A response could not be understood.
    #[error("Unexpected response from server: {0}")]
    MalformedResponse(String),
}

impl AppError {
    /// Text suitable for showing to the end user.
    ///
    /// Transport and parse details are replaced by generic wording; backend
    /// and payment network messages are passed through.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Could not reach the server. Please try again.".to_string(),
            Self::MalformedResponse(_) => {
                "The server sent an unexpected response. Please try again later.".to_string()
            }
            Self::AuthRejected(_) => "Your session has expired. Please sign in again.".to_string(),
            _ => self.to_string(),
        }
    }

    /// Payment reference attached to a partial failure.
    #[must_use]
    pub fn payment_intent_id(&self) -> Option<&str> {
        match self {
            Self::PaymentSucceededOrderFailed {
                payment_intent_id, ..
            }
            | Self::PaymentPendingForAnotherAccount { payment_intent_id } => {
                Some(payment_intent_id)
            }
            _ => None,
        }
    }

    /// Whether repeating the same action may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::PaymentSucceededOrderFailed { .. } | Self::CheckoutInProgress
        )
    }

    /// Report the error to Sentry when it needs attention from operators.
    ///
    /// Returns the Sentry event id if an event was captured.
    pub fn report(&self) -> Option<sentry::types::Uuid> {
        match self {
            Self::PaymentSucceededOrderFailed {
                payment_intent_id, ..
            } => {
                let event_id = sentry::with_scope(
                    |scope| scope.set_tag("payment_intent_id", payment_intent_id),
                    || sentry::capture_error(self),
                );
                tracing::error!(
                    error = %self,
                    payment_intent_id = %payment_intent_id,
                    sentry_event_id = %event_id,
                    "Payment captured without an order"
                );
                Some(event_id)
            }
            Self::PaymentPendingForAnotherAccount { payment_intent_id } => {
                let event_id = sentry::with_scope(
                    |scope| scope.set_tag("payment_intent_id", payment_intent_id),
                    || sentry::capture_error(self),
                );
                tracing::warn!(
                    payment_intent_id = %payment_intent_id,
                    sentry_event_id = %event_id,
                    "Pending payment not replayed under a different session"
                );
                Some(event_id)
            }
            Self::MalformedResponse(_) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Malformed response"
                );
                Some(event_id)
            }
            _ => None,
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Http(e) => Self::Network(e.to_string()),
            GatewayError::RateLimited(secs) => {
                Self::Network(format!("rate limited, retry after {secs} seconds"))
            }
            GatewayError::Status { status, message } if status >= 500 => {
                Self::Network(message.unwrap_or_else(|| format!("server returned {status}")))
            }
            GatewayError::Status {
                status: status @ (401 | 403),
                message,
            } => Self::AuthRejected(message.unwrap_or_else(|| format!("server returned {status}"))),
            GatewayError::Status { status, message } => {
                Self::Validation(message.unwrap_or_else(|| format!("Request rejected ({status})")))
            }
            GatewayError::NotFound(what) => Self::Validation(what),
            GatewayError::Parse(e) => Self::MalformedResponse(e.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined { message, code, .. } => Self::PaymentDeclined { message, code },
            PaymentError::Http(e) => Self::Network(e.to_string()),
            PaymentError::Status(status) => {
                Self::Network(format!("payment network returned {status}"))
            }
            PaymentError::Parse(e) => Self::MalformedResponse(e.to_string()),
            e @ PaymentError::InvalidClientSecret => Self::MalformedResponse(e.to_string()),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: Some(username.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
