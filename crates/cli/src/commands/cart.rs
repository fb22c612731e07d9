//! Cart commands.
//!
//! The cart is persisted under `BAZAAR_DATA_DIR`, so successive invocations
//! see the same cart. Remote writes are flushed before the process exits.

use bazaar_core::{NewCartItem, ProductId, UserId};
use bazaar_storefront::cart::MergeOutcome;
use bazaar_storefront::remote::FirebaseClient;
use bazaar_storefront::state::AppState;

use super::CliError;
use super::catalog;

/// Seconds to wait for the catalog when looking up a product to add.
const LOOKUP_WAIT_SECS: u64 = 10;

/// Add one unit of `product_id`, looked up in the catalog.
pub async fn add(
    state: &AppState<FirebaseClient>,
    product_id: &str,
    variant: Option<String>,
) -> Result<(), CliError> {
    let current = catalog::load(state, LOOKUP_WAIT_SECS).await;
    state.catalog().close();

    let product = current
        .product(&ProductId::new(product_id))
        .ok_or_else(|| CliError::UnknownProduct(product_id.to_string()))?;
    state
        .cart()
        .add_to_cart(NewCartItem::from_product(product, variant));
    Ok(())
}

pub fn remove(state: &AppState<FirebaseClient>, product_id: &str, variant: Option<&str>) {
    state
        .cart()
        .remove_from_cart(&ProductId::new(product_id), variant);
}

pub fn update(
    state: &AppState<FirebaseClient>,
    product_id: &str,
    quantity: u32,
    variant: Option<&str>,
) {
    state
        .cart()
        .update_quantity(&ProductId::new(product_id), quantity, variant);
}

/// Associate the cart with `user_id` and report the merge.
pub async fn login(state: &AppState<FirebaseClient>, user_id: String) {
    let outcome = state.cart().set_user_id(Some(UserId::new(user_id))).await;
    let summary = match outcome {
        Some(MergeOutcome::Merged {
            remote_lines,
            local_only,
        }) => format!("merged {remote_lines} remote lines with {local_only} local-only lines"),
        Some(MergeOutcome::AdoptedRemote { lines }) => format!("loaded {lines} lines from your account"),
        Some(MergeOutcome::PushedLocal { lines }) => format!("saved {lines} lines to your account"),
        Some(MergeOutcome::NothingToSync) | None => "nothing to sync".to_string(),
        Some(MergeOutcome::FetchFailed) => "could not reach your saved cart, keeping this one".to_string(),
    };
    tracing::info!("{summary}");
}

/// Print the cart.
#[allow(clippy::print_stdout)]
pub fn show(state: &AppState<FirebaseClient>) {
    let cart = state.cart();
    match cart.user_id() {
        Some(user) => println!("cart of {user}"),
        None => println!("guest cart"),
    }
    for line in cart.items() {
        let variant = line
            .variant_key
            .as_deref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        println!(
            "  {:>3} x {}{variant}  {}",
            line.quantity,
            line.name,
            line.line_total()
        );
    }
    println!("{} items, total {}", cart.total_items(), cart.total_price());
}
