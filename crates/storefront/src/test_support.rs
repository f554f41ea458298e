//! In-memory fakes for the backend and payment network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::Notify;

use clickcart_core::{Price, ProductId};

use crate::gateway::{
    BackendGateway, Credentials, GatewayError, OrderRequest, PaymentIntent, PaymentIntentRequest,
};
use crate::models::{Order, Product, ProfilePayload, SignInRequest, SignUpRequest};
use crate::payment::{
    ClientSecret, IntentStatus, PaymentConfirmation, PaymentError, PaymentMethod, PaymentNetwork,
};

/// A scripted backend reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Fail { status: u16, message: Option<String> },
}

impl Reply {
    pub fn fail(status: u16, message: &str) -> Self {
        Self::Fail {
            status,
            message: Some(message.to_string()),
        }
    }

    fn into_result<T: DeserializeOwned>(self) -> Result<T, GatewayError> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            Self::Fail { status, message } => Err(GatewayError::Status { status, message }),
        }
    }
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SignIn(String),
    SignUp(String),
    FetchProfile { authorized: bool },
    CreateIntent(PaymentIntentRequest),
    CreateOrder(OrderRequest),
}

pub fn product(id: i64, price: Decimal, stock: u32) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: None,
        price: Price::new(price).unwrap_or(Price::ZERO),
        stock_quantity: stock,
        category: None,
        image_url: None,
        is_active: Some(true),
    }
}

pub fn profile_json(roles: Value) -> Value {
    json!({
        "id": 1,
        "username": "ada",
        "email": "ada@example.com",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "roles": roles
    })
}

pub fn order_json(request: &OrderRequest) -> Value {
    json!({
        "id": 100,
        "status": "PENDING",
        "totalAmount": "20.00",
        "stripePaymentIntentId": request.payment_intent_id,
        "shippingAddress": request.shipping_address,
        "billingAddress": request.billing_address,
        "orderItems": [{"quantity": request.quantity, "productId": request.product_id}]
    })
}

/// Backend fake with scripted replies and a call log.
#[derive(Default)]
pub struct FakeBackend {
    sign_in: Mutex<Option<Reply>>,
    profile: Mutex<Option<Reply>>,
    intents: Mutex<VecDeque<Reply>>,
    orders: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    intent_counter: AtomicU32,
    /// When set, `fetch_profile` waits for a notification before replying.
    pub profile_gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sign_in(self, reply: Reply) -> Self {
        *self.sign_in.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_profile(self, reply: Reply) -> Self {
        *self.profile.lock().unwrap() = Some(reply);
        self
    }

    pub fn push_intent(&self, reply: Reply) {
        self.intents.lock().unwrap().push_back(reply);
    }

    pub fn push_order(&self, reply: Reply) {
        self.orders.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn intent_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateIntent(_)))
            .count()
    }

    pub fn order_calls(&self) -> Vec<OrderRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateOrder(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BackendGateway for FakeBackend {
    async fn sign_in(&self, request: &SignInRequest) -> Result<Map<String, Value>, GatewayError> {
        self.record(Call::SignIn(request.username.clone()));
        let reply = self.sign_in.lock().unwrap().clone();
        reply
            .unwrap_or_else(|| Reply::fail(401, "Bad credentials"))
            .into_result()
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Value, GatewayError> {
        self.record(Call::SignUp(request.username.clone()));
        Ok(json!({"message": "User registered successfully!"}))
    }

    async fn fetch_profile(&self, credentials: &Credentials) -> Result<ProfilePayload, GatewayError> {
        self.record(Call::FetchProfile {
            authorized: !credentials.is_anonymous(),
        });
        if let Some(gate) = &self.profile_gate {
            gate.notified().await;
        }
        let reply = self.profile.lock().unwrap().clone();
        reply
            .unwrap_or_else(|| Reply::fail(401, "Unauthorized"))
            .into_result()
    }

    async fn create_payment_intent(
        &self,
        _credentials: &Credentials,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        self.record(Call::CreateIntent(request.clone()));
        let scripted = self.intents.lock().unwrap().pop_front();
        let reply = scripted.unwrap_or_else(|| {
            let n = self.intent_counter.fetch_add(1, Ordering::SeqCst) + 1;
            Reply::Json(json!({
                "clientSecret": format!("pi_test{n}_secret_s{n}"),
                "paymentIntentId": format!("pi_test{n}")
            }))
        });
        reply.into_result()
    }

    async fn confirm_and_create_order(
        &self,
        _credentials: &Credentials,
        request: &OrderRequest,
    ) -> Result<Order, GatewayError> {
        self.record(Call::CreateOrder(request.clone()));
        let scripted = self.orders.lock().unwrap().pop_front();
        scripted
            .unwrap_or_else(|| Reply::Json(order_json(request)))
            .into_result()
    }
}

/// Payment network fake. Confirms successfully unless an outcome is queued.
#[derive(Default)]
pub struct FakePayment {
    outcomes: Mutex<VecDeque<Result<PaymentConfirmation, PaymentError>>>,
    confirmed: Mutex<Vec<String>>,
}

impl FakePayment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: Result<PaymentConfirmation, PaymentError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn decline_next(&self, message: &str) {
        self.push_outcome(Err(PaymentError::Declined {
            message: message.to_string(),
            code: Some("card_declined".to_string()),
            decline_code: Some("generic_decline".to_string()),
        }));
    }

    /// Intent ids the fake was asked to confirm, in order.
    pub fn confirmed(&self) -> Vec<String> {
        self.confirmed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentNetwork for FakePayment {
    async fn confirm_card_payment(
        &self,
        secret: &ClientSecret,
        _method: &PaymentMethod,
    ) -> Result<PaymentConfirmation, PaymentError> {
        let intent_id = secret.intent_id().map(String::from);
        self.confirmed
            .lock()
            .unwrap()
            .push(intent_id.clone().unwrap_or_default());

        let scripted = self.outcomes.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(PaymentConfirmation {
            payment_intent_id: intent_id,
            status: IntentStatus::Succeeded,
        }))
    }
}
