//! Sign-in, restore and sign-out against a mocked backend.
//!
//! Each `ctx.app()` call behaves like a fresh process sharing the same state
//! directory, so these tests observe exactly what is persisted.

use clickcart_core::{ProductId, Quantity, Role};
use clickcart_integration_tests::{
    TEST_TOKEN, TestContext, product_json, profile_json, sign_in_json,
};
use clickcart_storefront::error::AppError;
use clickcart_storefront::services::RestoreOutcome;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_sign_in(ctx: &TestContext) {
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/auth/signin")))
        .and(body_partial_json(json!({"username": "ada", "password": "hunter22"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(sign_in_json(1, "ada", &["ROLE_USER"])),
        )
        .mount(&ctx.backend)
        .await;
}

#[tokio::test]
async fn test_login_persists_token_and_next_start_restores_user() {
    let ctx = TestContext::start().await;
    mount_sign_in(&ctx).await;
    Mock::given(method("GET"))
        .and(path(TestContext::api_path("/user/profile")))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(profile_json(1, "ada", &["USER", "ADMIN"])),
        )
        .expect(1)
        .mount(&ctx.backend)
        .await;

    let first = ctx.app();
    assert!(matches!(first.start().await, RestoreOutcome::NoToken));
    assert!(!first.session().is_loading());

    let user = first
        .session()
        .login("ada", SecretString::from("hunter22"))
        .await
        .expect("login should succeed");
    assert_eq!(user.username, "ada");
    assert!(first.session().is_authenticated());
    assert!(!first.session().is_admin());
    first.teardown();

    let second = ctx.app();
    assert!(second.session().is_loading());
    match second.start().await {
        RestoreOutcome::Restored(profile) => {
            assert_eq!(profile.username, "ada");
            assert!(profile.has_role(&Role::Admin));
        }
        other => panic!("expected restored session, got {other:?}"),
    }
    assert!(second.session().is_admin());
    assert!(!second.session().is_loading());
}

#[tokio::test]
async fn test_rejected_token_is_forgotten() {
    let ctx = TestContext::start().await;
    Mock::given(method("GET"))
        .and(path(TestContext::api_path("/user/profile")))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid JWT token"})),
        )
        .expect(1)
        .mount(&ctx.backend)
        .await;

    ctx.app().session().set_token(SecretString::from("stale-token"));

    let second = ctx.app();
    assert!(matches!(
        second.start().await,
        RestoreOutcome::Cleared(AppError::AuthRejected(_))
    ));
    assert!(!second.session().has_token());

    // Nothing left to validate, so no second profile request.
    let third = ctx.app();
    assert!(matches!(third.start().await, RestoreOutcome::NoToken));
}

#[tokio::test]
async fn test_login_relays_backend_message() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/auth/signin")))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"message": "Invalid username or password"})),
        )
        .mount(&ctx.backend)
        .await;

    let app = ctx.app();
    let err = app
        .session()
        .login("ada", SecretString::from("wrong"))
        .await
        .expect_err("login should fail");

    assert!(matches!(err, AppError::Validation(ref m) if m == "Invalid username or password"));
    assert!(!app.session().has_token());
}

#[tokio::test]
async fn test_login_without_usable_token() {
    let ctx = TestContext::start().await;
    Mock::given(method("POST"))
        .and(path(TestContext::api_path("/auth/signin")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "   ",
            "id": 1,
            "username": "ada"
        })))
        .mount(&ctx.backend)
        .await;

    let app = ctx.app();
    let err = app
        .session()
        .login("ada", SecretString::from("hunter22"))
        .await
        .expect_err("login should fail");

    assert!(matches!(err, AppError::NoTokenReceived));
    assert!(!app.session().is_authenticated());
}

#[tokio::test]
async fn test_logout_forgets_token_but_keeps_cart() {
    let ctx = TestContext::start().await;
    mount_sign_in(&ctx).await;
    Mock::given(method("GET"))
        .and(path(TestContext::api_path("/products/5")))
        .respond_with(ResponseTemplate::new(200).set_body_json(product_json(5, "Mug", "10.00", 3)))
        .mount(&ctx.backend)
        .await;

    let app = ctx.app();
    app.start().await;
    app.session()
        .login("ada", SecretString::from("hunter22"))
        .await
        .expect("login should succeed");
    let mug = app
        .backend()
        .get_product(ProductId::new(5))
        .await
        .expect("product should load");
    app.cart().add_item(&mug, Quantity::clamped(2));
    app.session().logout();
    app.teardown();

    let next = ctx.app();
    assert!(matches!(next.start().await, RestoreOutcome::NoToken));
    assert_eq!(next.cart().item_count(), 2);
    assert_eq!(next.cart().items()[0].name, "Mug");
}
