//! Session commands: sign-in, sign-out, registration and profile.

use secrecy::SecretString;

use clickcart_storefront::error::{AppError, Result};
use clickcart_storefront::models::{ProfileUpdate, SignUpRequest};
use clickcart_storefront::state::AppState;

/// Sign in and persist the token.
pub async fn login(state: &AppState, username: &str, password: String) -> Result<()> {
    let user = state
        .session()
        .login(username, SecretString::from(password))
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Signed in as {} ({})", user.display_name(), user.username);
        if state.session().is_admin() {
            println!("  Role: admin");
        }
    }
    Ok(())
}

/// Sign out. The cart is kept.
#[allow(clippy::print_stdout)]
pub fn logout(state: &AppState) {
    let was_signed_in = state.session().has_token();
    state.session().logout();

    if was_signed_in {
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
}

/// Show the restored user, if any.
#[allow(clippy::print_stdout)]
pub fn whoami(state: &AppState) {
    match state.session().current_user() {
        Some(user) => {
            println!("{} ({})", user.display_name(), user.username);
            println!("  ID:    {}", user.id);
            if let Some(email) = &user.email {
                println!("  Email: {email}");
            }
            let roles: Vec<String> = user.roles.iter().map(ToString::to_string).collect();
            if !roles.is_empty() {
                println!("  Roles: {}", roles.join(", "));
            }
        }
        None if state.session().has_token() => println!("Token present but not validated"),
        None => println!("Not signed in"),
    }
}

/// Assemble a sign-up body from command-line arguments.
pub fn sign_up_request(
    username: String,
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
) -> SignUpRequest {
    SignUpRequest {
        username,
        email,
        password: SecretString::from(password),
        first_name,
        last_name,
        phone_number: phone,
    }
}

/// Create an account. Does not sign in.
pub async fn register(state: &AppState, request: &SignUpRequest) -> Result<()> {
    let response = state.session().register(request).await?;

    #[allow(clippy::print_stdout)]
    {
        match response.as_str() {
            Some(message) => println!("{message}"),
            None => println!("Account created for {}", request.username),
        }
        println!("Sign in with: clickcart login -u {}", request.username);
    }
    Ok(())
}

/// Attach a token obtained elsewhere.
pub fn set_token(state: &AppState, token: String) {
    state.session().set_token(SecretString::from(token));

    #[allow(clippy::print_stdout)]
    {
        println!("Token saved; it will be validated on the next run");
    }
}

/// Check that the backend answers.
pub async fn ping(state: &AppState) -> Result<()> {
    let response = state.backend().test_connection().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Backend reachable at {}", state.backend().base_url());
        if let Some(message) = response.as_str() {
            println!("  {message}");
        }
    }
    Ok(())
}

/// Update name and phone number of the signed-in user.
pub async fn update_profile(
    state: &AppState,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
) -> Result<()> {
    let credentials = state.session().credentials();
    if credentials.is_anonymous() {
        return Err(AppError::NotSignedIn);
    }

    let update = ProfileUpdate {
        first_name,
        last_name,
        phone_number: phone,
    };
    state.backend().update_profile(&credentials, &update).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Profile updated");
    }
    Ok(())
}
