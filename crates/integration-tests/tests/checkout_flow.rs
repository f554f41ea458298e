//! Two-phase checkout against mocked backend and payment network.

use clickcart_core::{OrderId, ProductId, Quantity};
use clickcart_integration_tests::{
    TEST_TOKEN, TestContext, order_json, product_json, profile_json, sign_in_json,
};
use clickcart_storefront::error::AppError;
use clickcart_storefront::payment::PaymentMethod;
use clickcart_storefront::services::{CheckoutRequest, CheckoutState, RestoreOutcome};
use clickcart_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const ADDRESS: &str = "123 Main St, City, State 12345";

fn request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: ADDRESS.to_string(),
        billing_address: ADDRESS.to_string(),
        payment_method: PaymentMethod::new("pm_card_visa"),
    }
}

/// Sign in as `ada` and put two mugs in the cart.
async fn signed_in_with_cart(ctx: &TestContext) -> (AppState, Value) {
    let mug = product_json(5, "Mug", "10.00", 3);
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/auth/signin")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(sign_in_json(1, "ada", &["ROLE_USER"])),
        )
        .mount(&ctx.backend)
        .await;
    Mock::given(method("GET"))
        .and(path(TestContext::api_path("/products/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(mug.clone()))
        .mount(&ctx.backend)
        .await;

    let app = ctx.app();
    app.start().await;
    app.session()
        .login("ada", SecretString::from("hunter22"))
        .await
        .expect("login should succeed");

    let product = app
        .backend()
        .get_product(ProductId::new(5))
        .await
        .expect("product should load");
    app.cart()
        .check_stock(&product, Quantity::clamped(2))
        .expect("stock should suffice");
    app.cart().add_item(&product, Quantity::clamped(2));

    (app, mug)
}

async fn mount_intent(ctx: &TestContext, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/payment/create-payment-intent")))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(body_partial_json(json!({
            "productId": 5,
            "quantity": 2,
            "shippingAddress": ADDRESS,
            "billingAddress": ADDRESS
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clientSecret": "pi_123_secret_abc",
            "paymentIntentId": "pi_123"
        })))
        .expect(expected_calls)
        .mount(&ctx.backend)
        .await;
}

async fn mount_confirm(ctx: &TestContext, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_123/confirm"))
        .and(header("authorization", "Bearer pk_test_integration"))
        .and(body_string_contains("payment_method=pm_card_visa"))
        .and(body_string_contains("client_secret=pi_123_secret_abc"))
        .respond_with(response)
        .expect(expected_calls)
        .mount(&ctx.payments)
        .await;
}

fn succeeded() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "pi_123",
        "object": "payment_intent",
        "status": "succeeded"
    }))
}

#[tokio::test]
async fn test_checkout_creates_order_and_clears_cart() {
    let ctx = TestContext::start().await;
    let (app, mug) = signed_in_with_cart(&ctx).await;
    mount_intent(&ctx, 1).await;
    mount_confirm(&ctx, succeeded(), 1).await;
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/payment/confirm-and-create-order")))
        .and(body_partial_json(json!({
            "productId": 5,
            "quantity": 2,
            "paymentIntentId": "pi_123"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(101, &mug, 2, "pi_123")))
        .expect(1)
        .mount(&ctx.backend)
        .await;

    let receipt = app
        .checkout()
        .submit(request())
        .await
        .expect("checkout should succeed");

    assert_eq!(receipt.order.id, OrderId::new(101));
    assert_eq!(receipt.payment_intent_id, "pi_123");
    assert_eq!(app.checkout().state(), CheckoutState::OrderCreated);
    assert!(app.cart().is_empty());
    assert!(app.checkout().pending_payment().is_none());

    // The emptied cart is what the next process sees.
    app.teardown();
    assert!(ctx.app().cart().is_empty());
}

#[tokio::test]
async fn test_declined_card_creates_no_order() {
    let ctx = TestContext::start().await;
    let (app, _) = signed_in_with_cart(&ctx).await;
    mount_intent(&ctx, 1).await;
    mount_confirm(
        &ctx,
        ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "decline_code": "insufficient_funds",
                "message": "Your card has insufficient funds."
            }
        })),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/payment/confirm-and-create-order")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.backend)
        .await;

    let err = app
        .checkout()
        .submit(request())
        .await
        .expect_err("checkout should fail");

    match err {
        AppError::PaymentDeclined { message, code } => {
            assert_eq!(message, "Your card has insufficient funds.");
            assert_eq!(code.as_deref(), Some("card_declined"));
        }
        other => panic!("expected a declined payment, got {other:?}"),
    }
    assert_eq!(app.checkout().state(), CheckoutState::PaymentFailed);
    assert_eq!(app.cart().item_count(), 2);
    assert!(app.checkout().pending_payment().is_none());
}

#[tokio::test]
async fn test_order_failure_after_charge_retries_order_only() {
    let ctx = TestContext::start().await;
    let (app, mug) = signed_in_with_cart(&ctx).await;
    // Charged exactly once across both submissions.
    mount_intent(&ctx, 1).await;
    mount_confirm(&ctx, succeeded(), 1).await;
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/payment/confirm-and-create-order")))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "Database unavailable"})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&ctx.backend)
        .await;
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/payment/confirm-and-create-order")))
        .and(body_partial_json(json!({"paymentIntentId": "pi_123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(102, &mug, 2, "pi_123")))
        .expect(1)
        .mount(&ctx.backend)
        .await;

    let err = app
        .checkout()
        .submit(request())
        .await
        .expect_err("order creation should fail");

    assert_eq!(err.payment_intent_id(), Some("pi_123"));
    assert!(err.user_message().contains("Database unavailable"));
    assert!(err.user_message().contains("pi_123"));
    assert_eq!(app.checkout().state(), CheckoutState::OrderCreationFailed);
    assert_eq!(app.checkout().pending_payment().as_deref(), Some("pi_123"));
    assert!(!app.cart().is_empty());

    let receipt = app
        .checkout()
        .submit(request())
        .await
        .expect("retry should create the order");

    assert_eq!(receipt.order.id, OrderId::new(102));
    assert_eq!(receipt.payment_intent_id, "pi_123");
    assert!(app.cart().is_empty());
    assert!(app.checkout().pending_payment().is_none());
}

/// First order call fails once; every later one succeeds.
async fn mount_order_failing_once(ctx: &TestContext, mug: &Value, expected_successes: u64) {
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/payment/confirm-and-create-order")))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "Database unavailable"})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&ctx.backend)
        .await;
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/payment/confirm-and-create-order")))
        .and(body_partial_json(json!({"paymentIntentId": "pi_123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(103, mug, 2, "pi_123")))
        .expect(expected_successes)
        .mount(&ctx.backend)
        .await;
}

#[tokio::test]
async fn test_pending_payment_survives_restart() {
    let ctx = TestContext::start().await;
    let (app, mug) = signed_in_with_cart(&ctx).await;
    mount_intent(&ctx, 1).await;
    mount_confirm(&ctx, succeeded(), 1).await;
    mount_order_failing_once(&ctx, &mug, 1).await;
    Mock::given(method("GET"))
        .and(path(TestContext::api_path("/user/profile")))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json(1, "ada", &["USER"])))
        .mount(&ctx.backend)
        .await;

    app.checkout()
        .submit(request())
        .await
        .expect_err("order creation should fail");
    app.teardown();
    drop(app);

    // A new process: same state directory, same user.
    let next = ctx.app();
    assert_eq!(next.checkout().pending_payment().as_deref(), Some("pi_123"));
    assert!(matches!(next.start().await, RestoreOutcome::Restored(_)));
    assert_eq!(next.cart().item_count(), 2);

    let receipt = next
        .checkout()
        .submit(request())
        .await
        .expect("resubmit should only create the order");

    assert_eq!(receipt.order.id, OrderId::new(103));
    assert_eq!(receipt.payment_intent_id, "pi_123");
    assert!(next.cart().is_empty());
    assert!(next.checkout().pending_payment().is_none());
    next.teardown();
    assert!(ctx.app().checkout().pending_payment().is_none());
}

#[tokio::test]
async fn test_pending_payment_is_not_replayed_for_another_account() {
    let ctx = TestContext::start().await;
    let (app, mug) = signed_in_with_cart(&ctx).await;
    mount_intent(&ctx, 1).await;
    mount_confirm(&ctx, succeeded(), 1).await;
    mount_order_failing_once(&ctx, &mug, 0).await;

    app.checkout()
        .submit(request())
        .await
        .expect_err("order creation should fail");
    app.session().logout();
    app.session().set_token(SecretString::from("jwt-someone-else"));

    let err = app
        .checkout()
        .submit(request())
        .await
        .expect_err("another account must not replay the payment");

    assert!(matches!(
        &err,
        AppError::PaymentPendingForAnotherAccount { payment_intent_id } if payment_intent_id == "pi_123"
    ));
    assert_eq!(app.cart().item_count(), 2);
    assert_eq!(app.checkout().pending_payment().as_deref(), Some("pi_123"));
}

#[tokio::test]
async fn test_checkout_requires_sign_in() {
    let ctx = TestContext::start().await;
    Mock::given(method("GET"))
        .and(path(TestContext::api_path("/products/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(product_json(5, "Mug", "10.00", 3)))
        .mount(&ctx.backend)
        .await;
    mount_intent(&ctx, 0).await;

    let app = ctx.app();
    app.start().await;
    let product = app
        .backend()
        .get_product(ProductId::new(5))
        .await
        .expect("product should load");
    app.cart().add_item(&product, Quantity::ONE);

    let err = app
        .checkout()
        .submit(request())
        .await
        .expect_err("checkout should be refused");

    assert!(matches!(err, AppError::NotSignedIn));
    assert_eq!(app.checkout().state(), CheckoutState::Idle);
}
