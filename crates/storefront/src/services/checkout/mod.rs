//! Checkout orchestrator: payment intent, card confirmation, order creation.
//!
//! # Protocol
//!
//! 1. Ask the backend for a payment intent for the first cart line.
//! 2. Confirm the card with the payment network (single attempt).
//! 3. Ask the backend to verify the payment and create the order, using the
//!    intent id from the confirmation result when it carries one.
//! 4. Clear the cart.
//!
//! Steps 2 and 3 can fail independently. If the card was charged but the
//! order call failed, the confirmed order request is kept as a pending
//! payment and written to storage. The next
//! [`submit`](CheckoutOrchestrator::submit), in this run or a later one, or an
//! explicit [`retry_order_creation`](CheckoutOrchestrator::retry_order_creation)
//! repeats only the order call, so a customer is never charged twice.
//!
//! A pending payment is replayed only for the session that paid. If the
//! order call answered with a success status but an unreadable body, the
//! order may already exist: `submit` then refuses to replay it and only an
//! explicit retry does.
//!
//! Only one attempt runs at a time.

mod attempt;
mod pending;

pub use attempt::{CheckoutAttempt, CheckoutReceipt, CheckoutRequest, CheckoutState};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{Instrument, error, info, info_span, warn};

use clickcart_core::UserId;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::gateway::{BackendGateway, Credentials, GatewayError, OrderRequest, PaymentIntentRequest};
use crate::payment::PaymentNetwork;
use crate::services::{CartStore, SessionStore};
use crate::storage::KeyValueStore;
use pending::{PaymentOwner, PendingOrder};

/// Payment reference reported when a charge was confirmed without an id.
pub const UNKNOWN_PAYMENT_REFERENCE: &str = "unknown";

const ORDER_MAY_EXIST: &str = "the order response could not be read, so the order may \
    already exist. Check your orders before retrying";

/// Drives checkout attempts.
///
/// Cheap to clone; clones share the in-flight marker and pending payment.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    inner: Arc<CheckoutOrchestratorInner>,
}

struct CheckoutOrchestratorInner {
    gateway: Arc<dyn BackendGateway>,
    payments: Arc<dyn PaymentNetwork>,
    session: SessionStore,
    cart: CartStore,
    storage: Arc<dyn KeyValueStore>,
    in_flight: AtomicBool,
    last_attempt: Mutex<Option<CheckoutAttempt>>,
    pending: Mutex<Option<PendingOrder>>,
}

/// Marks an attempt as running; released on drop.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CheckoutOrchestrator {
    /// Build the orchestrator, loading any payment a previous run captured
    /// without an order.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        payments: Arc<dyn PaymentNetwork>,
        session: SessionStore,
        cart: CartStore,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let pending = pending::load(storage.as_ref());
        Self {
            inner: Arc::new(CheckoutOrchestratorInner {
                gateway,
                payments,
                session,
                cart,
                storage,
                in_flight: AtomicBool::new(false),
                last_attempt: Mutex::new(None),
                pending: Mutex::new(pending),
            }),
        }
    }

    fn begin(&self) -> Result<InFlight<'_>> {
        self.inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.inner.in_flight))
            .map_err(|_| AppError::CheckoutInProgress)
    }

    fn identity(&self) -> Result<(Credentials, Option<UserId>)> {
        let (credentials, user_id) = self.inner.session.identity();
        if credentials.is_anonymous() {
            return Err(AppError::NotSignedIn);
        }
        Ok((credentials, user_id))
    }

    fn record(&self, attempt: &CheckoutAttempt) {
        *lock(&self.inner.last_attempt) = Some(attempt.clone());
    }

    fn transition(&self, attempt: &mut CheckoutAttempt, state: CheckoutState) {
        info!(from = %attempt.state, to = %state, "Checkout state change");
        attempt.state = state;
        self.record(attempt);
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Pay for the first cart line and create its order.
    ///
    /// If an earlier attempt was charged but has no order yet, only the order
    /// creation for that payment is retried and `request` is ignored.
    ///
    /// # Errors
    ///
    /// - `CheckoutInProgress` if another attempt is running.
    /// - `NotSignedIn` / `EmptyCart` before any network call.
    /// - `PaymentPendingForAnotherAccount` if a different session's payment
    ///   is awaiting its order.
    /// - The backend error if the payment intent cannot be created.
    /// - `PaymentDeclined` (or `Network`) if card confirmation fails.
    /// - `PaymentSucceededOrderFailed` if the order call fails after a
    ///   successful charge, or if a pending order may already exist.
    pub async fn submit(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        let _in_flight = self.begin()?;
        let (credentials, user_id) = self.identity()?;

        if let Some(pending) = self.owned_pending(&credentials, user_id)? {
            if pending.order_may_exist {
                warn!(
                    payment_intent_id = %pending.payment_intent_id(),
                    "Order may already exist, not replaying it automatically"
                );
                return Err(AppError::PaymentSucceededOrderFailed {
                    payment_intent_id: pending.request.payment_intent_id,
                    message: ORDER_MAY_EXIST.to_string(),
                });
            }
            info!(
                payment_intent_id = %pending.payment_intent_id(),
                "Payment already captured, retrying order creation only"
            );
            return self.retry_pending(&credentials, pending).await;
        }

        let item = self.inner.cart.first_item().ok_or(AppError::EmptyCart)?;
        let attempt = CheckoutAttempt::new(&item, &request, self.inner.cart.revision());
        self.record(&attempt);

        let span = info_span!(
            "checkout",
            attempt_id = %attempt.attempt_id,
            product_id = %attempt.product_id,
            quantity = %attempt.quantity
        );
        let owner = PaymentOwner::new(&credentials, user_id);
        self.run(&credentials, owner, attempt, &request)
            .instrument(span)
            .await
    }

    /// Repeat the order call for a captured payment.
    ///
    /// Also replays an order whose earlier response was unreadable.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if no payment is pending,
    /// `PaymentPendingForAnotherAccount` if it belongs to a different
    /// session, otherwise as [`submit`](Self::submit) step 3.
    pub async fn retry_order_creation(&self) -> Result<CheckoutReceipt> {
        let _in_flight = self.begin()?;
        let (credentials, user_id) = self.identity()?;
        let pending = self
            .owned_pending(&credentials, user_id)?
            .ok_or_else(|| AppError::Validation("No payment is awaiting order creation".to_string()))?;
        if pending.order_may_exist {
            warn!(
                payment_intent_id = %pending.payment_intent_id(),
                "Replaying an order call whose earlier response was unreadable"
            );
        }
        self.retry_pending(&credentials, pending).await
    }

    /// Intent id of a payment that was captured without an order.
    #[must_use]
    pub fn pending_payment(&self) -> Option<String> {
        lock(&self.inner.pending)
            .as_ref()
            .map(|p| p.request.payment_intent_id.clone())
    }

    /// Forget a pending payment after it was reconciled by other means.
    ///
    /// Returns the discarded intent id.
    pub fn discard_pending_payment(&self) -> Option<String> {
        let discarded = {
            let mut slot = lock(&self.inner.pending);
            let discarded = slot.take()?;
            pending::persist(self.inner.storage.as_ref(), None);
            discarded
        };
        warn!(
            payment_intent_id = %discarded.payment_intent_id(),
            "Pending payment discarded without an order"
        );
        Some(discarded.request.payment_intent_id)
    }

    /// Snapshot of the most recent attempt.
    #[must_use]
    pub fn last_attempt(&self) -> Option<CheckoutAttempt> {
        lock(&self.inner.last_attempt).clone()
    }

    /// State of the most recent attempt, `Idle` if there was none.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        lock(&self.inner.last_attempt)
            .as_ref()
            .map_or(CheckoutState::Idle, |a| a.state)
    }

    /// Whether an attempt is running.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    // =========================================================================
    // Protocol
    // =========================================================================

    fn pending_order(&self) -> Option<PendingOrder> {
        lock(&self.inner.pending).clone()
    }

    /// Memory and storage are updated under the same lock.
    fn set_pending(&self, pending: Option<PendingOrder>) {
        let mut slot = lock(&self.inner.pending);
        pending::persist(self.inner.storage.as_ref(), pending.as_ref());
        *slot = pending;
    }

    /// The pending payment, refused if another session made it.
    fn owned_pending(
        &self,
        credentials: &Credentials,
        user_id: Option<UserId>,
    ) -> Result<Option<PendingOrder>> {
        let Some(pending) = self.pending_order() else {
            return Ok(None);
        };
        if pending.owner.matches(credentials, user_id) {
            return Ok(Some(pending));
        }
        let err = AppError::PaymentPendingForAnotherAccount {
            payment_intent_id: pending.request.payment_intent_id,
        };
        err.report();
        Err(err)
    }

    async fn retry_pending(
        &self,
        credentials: &Credentials,
        mut pending: PendingOrder,
    ) -> Result<CheckoutReceipt> {
        let span = info_span!(
            "checkout_retry",
            attempt_id = %pending.attempt.attempt_id,
            payment_intent_id = %pending.payment_intent_id()
        );
        async move {
            self.transition(&mut pending.attempt, CheckoutState::PaymentConfirmed);
            self.create_order(credentials, pending).await
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        credentials: &Credentials,
        owner: PaymentOwner,
        mut attempt: CheckoutAttempt,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt> {
        // Step 1: payment intent
        self.transition(&mut attempt, CheckoutState::IntentRequested);
        let intent_request = PaymentIntentRequest {
            product_id: attempt.product_id,
            quantity: attempt.quantity.get(),
            shipping_address: attempt.shipping_address.clone(),
            billing_address: attempt.billing_address.clone(),
        };

        let intent = match self
            .inner
            .gateway
            .create_payment_intent(credentials, &intent_request)
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                self.transition(&mut attempt, CheckoutState::IntentFailed);
                let err = AppError::from(e);
                warn!(error = %err, "Payment intent creation failed");
                return Err(err);
            }
        };

        attempt.payment_intent_id = intent
            .payment_intent_id
            .clone()
            .or_else(|| intent.client_secret.intent_id().map(String::from));
        self.transition(&mut attempt, CheckoutState::IntentReady);

        // Step 2: card confirmation, never retried
        self.transition(&mut attempt, CheckoutState::PaymentSubmitted);
        let confirmation = match self
            .inner
            .payments
            .confirm_card_payment(&intent.client_secret, &request.payment_method)
            .await
        {
            Ok(confirmation) if confirmation.succeeded() => confirmation,
            Ok(confirmation) => {
                self.transition(&mut attempt, CheckoutState::PaymentFailed);
                warn!(status = %confirmation.status, "Payment not completed");
                return Err(AppError::PaymentDeclined {
                    message: format!(
                        "Payment was not completed (status: {})",
                        confirmation.status
                    ),
                    code: None,
                });
            }
            Err(e) => {
                self.transition(&mut attempt, CheckoutState::PaymentFailed);
                let err = AppError::from(e);
                warn!(error = %err, "Payment confirmation failed");
                return Err(err);
            }
        };

        attempt.payment_confirmed = true;

        // The network's id wins over the provisional one.
        let Some(payment_intent_id) = confirmation
            .payment_intent_id
            .or_else(|| attempt.payment_intent_id.clone())
        else {
            // Charged, but there is nothing to create the order against.
            self.transition(&mut attempt, CheckoutState::OrderCreationFailed);
            let err = AppError::PaymentSucceededOrderFailed {
                payment_intent_id: UNKNOWN_PAYMENT_REFERENCE.to_string(),
                message: "the payment was confirmed without a payment reference".to_string(),
            };
            err.report();
            return Err(err);
        };

        attempt.payment_intent_id = Some(payment_intent_id.clone());
        self.transition(&mut attempt, CheckoutState::PaymentConfirmed);
        add_breadcrumb(
            "checkout",
            "Payment confirmed",
            Some(&[("payment_intent_id", payment_intent_id.as_str())]),
        );

        // Recorded before the order call: from here on only that call may be
        // repeated for this payment.
        let pending = PendingOrder {
            attempt,
            request: OrderRequest::for_intent(&intent_request, payment_intent_id),
            owner,
            order_may_exist: false,
        };
        self.set_pending(Some(pending.clone()));

        // Step 3: order creation
        self.create_order(credentials, pending).await
    }

    async fn create_order(
        &self,
        credentials: &Credentials,
        mut pending: PendingOrder,
    ) -> Result<CheckoutReceipt> {
        match self
            .inner
            .gateway
            .confirm_and_create_order(credentials, &pending.request)
            .await
        {
            Ok(order) => {
                self.set_pending(None);
                let PendingOrder {
                    mut attempt,
                    request,
                    ..
                } = pending;
                attempt.order_created = true;
                attempt.order_id = Some(order.id);
                self.transition(&mut attempt, CheckoutState::OrderCreated);

                if self.inner.cart.revision() != attempt.cart_revision {
                    warn!(
                        started_at_revision = attempt.cart_revision,
                        current_revision = self.inner.cart.revision(),
                        "Cart changed during checkout, clearing anyway"
                    );
                }
                self.inner.cart.clear();

                add_breadcrumb(
                    "checkout",
                    "Order created",
                    Some(&[("order_id", order.id.to_string().as_str())]),
                );
                info!(order_id = %order.id, "Checkout complete");

                Ok(CheckoutReceipt {
                    attempt_id: attempt.attempt_id,
                    order,
                    payment_intent_id: request.payment_intent_id,
                })
            }
            Err(e) => {
                self.transition(&mut pending.attempt, CheckoutState::OrderCreationFailed);
                let message = if matches!(e, GatewayError::Parse(_)) {
                    pending.order_may_exist = true;
                    error!(
                        error = %e,
                        payment_intent_id = %pending.payment_intent_id(),
                        "Order response unreadable, the order may already exist"
                    );
                    ORDER_MAY_EXIST.to_string()
                } else {
                    e.backend_message()
                        .map_or_else(|| e.to_string(), String::from)
                };
                let err = AppError::PaymentSucceededOrderFailed {
                    payment_intent_id: pending.request.payment_intent_id.clone(),
                    message,
                };
                self.set_pending(Some(pending));
                err.report();
                Err(err)
            }
        }
    }
}
