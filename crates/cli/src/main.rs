//! Bazaar CLI - drive the storefront stores from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # List the catalog (waits for the live collections)
//! bazaar catalog list
//! bazaar catalog list --category electronics
//!
//! # Cart operations (persisted under BAZAAR_DATA_DIR)
//! bazaar cart add fb-1 --variant red
//! bazaar cart update fb-1 3 --variant red
//! bazaar cart show
//!
//! # Associate the cart with a user and merge with their remote cart
//! bazaar cart login <uid>
//!
//! # Send a contact message
//! bazaar contact -n "Ana" -e ana@example.com -m "Where is my order?"
//! ```
//!
//! # Commands
//!
//! - `catalog` - List or refresh the catalog
//! - `cart` - Show and change the local cart
//! - `contact` - Submit a contact or support message
//! - `cache clear` - Drop the catalog snapshot
//! - `auth-message` - Show the user-facing text for an auth error code

#![cfg_attr(not(test), forbid(unsafe_code))]

use bazaar_storefront::config::StorefrontConfig;
use bazaar_storefront::error::StorefrontError;
use bazaar_storefront::state::AppState;
use commands::CliError;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage the local cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Submit a contact or support message
    Contact {
        /// Sender name
        #[arg(short, long)]
        name: String,

        /// Sender email address
        #[arg(short, long)]
        email: String,

        /// Message body
        #[arg(short, long)]
        message: String,

        /// Optional subject line
        #[arg(short, long)]
        subject: Option<String>,

        /// Send as a support chat message instead of a contact form
        #[arg(long)]
        support: bool,
    },
    /// Manage the catalog snapshot
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show the user-facing message for an auth error code
    AuthMessage {
        /// Provider error code, e.g. `auth/wrong-password`
        code: String,

        /// Flow that failed (`sign-in`, `sign-up`, `password-reset`)
        #[arg(short, long, default_value = "sign-in")]
        operation: String,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List products
    List {
        /// Only products in this category (slug or id)
        #[arg(short, long)]
        category: Option<String>,

        /// Seconds to wait for the live collections
        #[arg(short, long, default_value_t = 10)]
        wait: u64,
    },
    /// Drop the snapshot and reload from the remote
    Refresh {
        /// Seconds to wait for the live collections
        #[arg(short, long, default_value_t = 10)]
        wait: u64,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add one unit of a product
    Add {
        product_id: String,
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Remove a product (every variant unless one is given)
    Remove {
        product_id: String,
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Set the quantity of a product (0 removes it)
    Update {
        product_id: String,
        quantity: u32,
        #[arg(short, long)]
        variant: Option<String>,
    },
    /// Empty the cart
    Clear,
    /// Associate the cart with a user and merge with the remote cart
    Login { user_id: String },
    /// Disassociate the cart from its user
    Logout,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove the catalog snapshot
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
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

    tracing::info!("Sentry initialized");
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
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_storefront=info,bazaar_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `auth-message` needs no database.
    if let Commands::AuthMessage { code, operation } = &cli.command {
        init_tracing();
        if let Err(e) = commands::auth::show_message(code, operation) {
            tracing::error!("Command failed: {e}");
            std::process::exit(2);
        }
        return;
    }

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli.command, &config).await {
        if let CliError::Storefront(inner) = &e {
            inner.report();
        }
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &StorefrontConfig) -> Result<(), CliError> {
    let state = AppState::from_config(config).map_err(StorefrontError::from)?;

    match command {
        Commands::Catalog { action } => match action {
            CatalogAction::List { category, wait } => {
                commands::catalog::list(&state, category.as_deref(), wait).await;
            }
            CatalogAction::Refresh { wait } => commands::catalog::refresh(&state, wait).await,
        },
        Commands::Cart { action } => {
            match action {
                CartAction::Show => {}
                CartAction::Add {
                    product_id,
                    variant,
                } => commands::cart::add(&state, &product_id, variant).await?,
                CartAction::Remove {
                    product_id,
                    variant,
                } => commands::cart::remove(&state, &product_id, variant.as_deref()),
                CartAction::Update {
                    product_id,
                    quantity,
                    variant,
                } => commands::cart::update(&state, &product_id, quantity, variant.as_deref()),
                CartAction::Clear => state.cart().clear_cart(),
                CartAction::Login { user_id } => commands::cart::login(&state, user_id).await,
                CartAction::Logout => {
                    state.cart().set_user_id(None).await;
                }
            }
            state.cart().flush_remote().await;
            commands::cart::show(&state);
        }
        Commands::Contact {
            name,
            email,
            message,
            subject,
            support,
        } => {
            commands::contact::submit(&state, name, email, message, subject, support).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::catalog::clear_cache(&state),
        },
        Commands::AuthMessage { code, operation } => {
            commands::auth::show_message(&code, &operation)?;
        }
    }
    Ok(())
}
