//! Catalog commands.

use std::time::Duration;

use bazaar_core::Product;
use bazaar_storefront::catalog::{CatalogState, Source};
use bazaar_storefront::remote::FirebaseClient;
use bazaar_storefront::state::AppState;

/// Start the catalog and wait up to `wait` seconds for it to load.
pub async fn load(state: &AppState<FirebaseClient>, wait: u64) -> CatalogState {
    state.catalog().init();
    if !state
        .catalog()
        .wait_until_initialized(Duration::from_secs(wait))
        .await
    {
        tracing::warn!(
            progress = state.catalog().progress(),
            "catalog not fully loaded, showing what arrived"
        );
    }
    state.catalog().current()
}

/// Print the products, optionally limited to one category.
pub async fn list(state: &AppState<FirebaseClient>, category: Option<&str>, wait: u64) {
    let current = load(state, wait).await;
    let products: Vec<&Product> = match category {
        Some(category) => current.products_in_category(category),
        None => current.catalog.products.iter().collect(),
    };
    print_products(&current, &products);
    state.catalog().close();
}

/// Drop the snapshot, reload, and print a summary.
pub async fn refresh(state: &AppState<FirebaseClient>, wait: u64) {
    state.catalog().init();
    state.catalog().refresh();
    let loaded = state
        .catalog()
        .wait_until_initialized(Duration::from_secs(wait))
        .await;
    let current = state.catalog().current();

    #[allow(clippy::print_stdout)]
    {
        println!(
            "refreshed: {} products, {} categories, {} subcategories (complete: {loaded})",
            current.catalog.products.len(),
            current.catalog.categories.len(),
            current.catalog.subcategories.len(),
        );
    }
    state.catalog().close();
}

/// Remove the catalog snapshot.
pub fn clear_cache(state: &AppState<FirebaseClient>) {
    state.catalog().clear_snapshot();
    tracing::info!("catalog snapshot cleared");
}

const fn source_label(source: Source) -> &'static str {
    match source {
        Source::Pending => "pending",
        Source::Cache => "cached",
        Source::Live => "live",
        Source::Fallback => "bundled",
    }
}

#[allow(clippy::print_stdout)]
fn print_products(state: &CatalogState, products: &[&Product]) {
    println!(
        "{} products ({} data)",
        products.len(),
        source_label(state.products.source)
    );
    for product in products {
        let discount = product
            .discount_percent()
            .map(|percent| format!("  -{percent}%"))
            .unwrap_or_default();
        println!(
            "  {:<12} {:<32} {:>10}{discount}",
            product.id.as_str(),
            product.name,
            product.price.to_string()
        );
    }
}
