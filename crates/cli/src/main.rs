//! ClickCart CLI - storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session is persisted and restored on the next run)
//! clickcart login -u ada -p 'secret'
//!
//! # Browse and fill the cart
//! clickcart products list
//! clickcart cart add 12 -q 2
//!
//! # Pay for the first cart line
//! clickcart checkout --payment-method pm_card_visa
//!
//! # Charged but no order? Create it without charging again
//! clickcart checkout retry
//!
//! # Order history
//! clickcart orders mine
//! ```
//!
//! # Commands
//!
//! - `login`, `logout`, `whoami`, `register`, `set-token`, `ping` - Session
//! - `products` - Catalog browsing
//! - `cart` - Cart contents
//! - `checkout` - Payment and order creation
//! - `orders` - Order history and admin order management
//! - `profile` - Profile updates

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clickcart_core::{OrderId, OrderStatus, ProductId};
use clickcart_storefront::config::ClientConfig;
use clickcart_storefront::error::AppError;
use clickcart_storefront::payment::PaymentMethod;
use clickcart_storefront::services::{CheckoutRequest, RestoreOutcome};
use clickcart_storefront::state::AppState;

mod commands;

/// Address used when none is given, matching the storefront's checkout form.
const DEFAULT_ADDRESS: &str = "123 Main St, City, State 12345";

#[derive(Parser)]
#[command(name = "clickcart")]
#[command(author, version, about = "ClickCart storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (or set `CLICKCART_PASSWORD`)
        #[arg(short, long, env = "CLICKCART_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the persisted session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// Password (or set `CLICKCART_PASSWORD`)
        #[arg(short, long, env = "CLICKCART_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },
    /// Attach a raw token without validating it
    SetToken { token: String },
    /// Check that the backend is reachable
    Ping,
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for the first cart line and create the order
    #[command(args_conflicts_with_subcommands = true)]
    Checkout {
        #[command(subcommand)]
        action: Option<CheckoutAction>,

        #[command(flatten)]
        pay: PayArgs,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Manage the signed-in user's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List all products
    List,
    /// Show one product
    Show { id: ProductId },
    /// Search by keyword
    Search { keyword: String },
    /// List a category
    Category { name: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and total
    Show,
    /// Add a product (checked against stock)
    Add {
        id: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: i64,
    },
    /// Remove a product
    Remove { id: ProductId },
    /// Set a line's quantity (values below 1 become 1)
    Update {
        id: ProductId,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[derive(Args)]
struct PayArgs {
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    shipping_address: String,

    /// Defaults to the shipping address
    #[arg(long)]
    billing_address: Option<String>,

    /// Tokenized card, e.g. `pm_card_visa`
    #[arg(long, default_value = "pm_card_visa")]
    payment_method: String,
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Create the order for a payment that was charged without one
    Retry,
    /// Forget a charged payment after reconciling it with support
    Discard,
    /// Show whether a payment is awaiting its order
    Status,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Orders of the signed-in user
    Mine,
    /// All orders (admin)
    All,
    /// Change an order's status (admin)
    Status { id: OrderId, status: OrderStatus },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Update name and phone number
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clickcart_storefront=info,clickcart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    match state.start().await {
        RestoreOutcome::Cleared(reason) => {
            tracing::warn!("Saved session is no longer valid ({reason}); please sign in again");
        }
        RestoreOutcome::Restored(user) => tracing::debug!(user_id = %user.id, "Session restored"),
        RestoreOutcome::NoToken | RestoreOutcome::Superseded => {}
    }

    let result = run(&state, cli.command).await;
    state.teardown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.report();
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Error: {}", e.user_message());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(state: &AppState, command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Login { username, password } => {
            commands::session::login(state, &username, password).await?;
        }
        Commands::Logout => commands::session::logout(state),
        Commands::Whoami => commands::session::whoami(state),
        Commands::Register {
            username,
            email,
            password,
            first_name,
            last_name,
            phone,
        } => {
            let request = commands::session::sign_up_request(
                username, email, password, first_name, last_name, phone,
            );
            commands::session::register(state, &request).await?;
        }
        Commands::SetToken { token } => commands::session::set_token(state, token),
        Commands::Ping => commands::session::ping(state).await?,
        Commands::Products { action } => match action {
            ProductsAction::List => commands::catalog::list(state).await?,
            ProductsAction::Show { id } => commands::catalog::show(state, id).await?,
            ProductsAction::Search { keyword } => {
                commands::catalog::search(state, &keyword).await?;
            }
            ProductsAction::Category { name } => {
                commands::catalog::category(state, &name).await?;
            }
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(state),
            CartAction::Add { id, quantity } => commands::cart::add(state, id, quantity).await?,
            CartAction::Remove { id } => commands::cart::remove(state, id),
            CartAction::Update { id, quantity } => commands::cart::update(state, id, quantity),
            CartAction::Clear => commands::cart::clear(state),
        },
        Commands::Checkout { action, pay } => match action {
            None => {
                let billing_address = pay
                    .billing_address
                    .unwrap_or_else(|| pay.shipping_address.clone());
                let request = CheckoutRequest {
                    shipping_address: pay.shipping_address,
                    billing_address,
                    payment_method: PaymentMethod::new(pay.payment_method),
                };
                commands::checkout::run(state, request).await?;
            }
            Some(CheckoutAction::Retry) => commands::checkout::retry(state).await?,
            Some(CheckoutAction::Discard) => commands::checkout::discard(state),
            Some(CheckoutAction::Status) => commands::checkout::status(state),
        },
        Commands::Orders { action } => match action {
            OrdersAction::Mine => commands::orders::mine(state).await?,
            OrdersAction::All => commands::orders::all(state).await?,
            OrdersAction::Status { id, status } => {
                commands::orders::set_status(state, id, status).await?;
            }
        },
        Commands::Profile { action } => match action {
            ProfileAction::Update {
                first_name,
                last_name,
                phone,
            } => commands::session::update_profile(state, first_name, last_name, phone).await?,
        },
    }
    Ok(())
}
