//! Integration tests for Bazaar.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! The tests drive a full [`AppState`] against the in-memory remote, so no
//! database or network is needed. Durable storage is a real directory under
//! the system temp dir, removed when the [`TestContext`] drops.
//!
//! # Test Categories
//!
//! - `cart_sync` - Cart mutations, persistence and the login merge
//! - `catalog_cache` - Snapshot freshness, revalidation and fallback
//! - `support_flow` - Contact messages and profiles

use std::path::PathBuf;
use std::sync::Arc;

use bazaar_core::{Category, NewCartItem, Product, Subcategory};
use bazaar_storefront::clock::{Clock, ManualClock};
use bazaar_storefront::remote::MemoryRemote;
use bazaar_storefront::services::auth::Locale;
use bazaar_storefront::state::{AppOptions, AppState, Backends};
use bazaar_storefront::storage::{FileStorage, LocalStorage, MemoryStorage};
use chrono::{DateTime, Utc};
use serde_json::json;

/// A wired application plus handles on every backend.
pub struct TestContext {
    pub app: AppState<MemoryRemote>,
    pub remote: Arc<MemoryRemote>,
    pub session: Arc<MemoryStorage>,
    pub durable: Arc<FileStorage>,
    pub clock: Arc<ManualClock>,
    dir: PathBuf,
}

impl TestContext {
    /// Fresh context with an empty remote and empty storage.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory cannot be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("bazaar-it-{}", uuid::Uuid::new_v4().simple()));
        let durable = Arc::new(FileStorage::open(&dir).expect("Failed to create temp storage"));
        Self::with_parts(
            Arc::new(MemoryRemote::new()),
            Arc::new(MemoryStorage::new()),
            durable,
            Arc::new(ManualClock::new(start_time())),
            dir,
        )
    }

    fn with_parts(
        remote: Arc<MemoryRemote>,
        session: Arc<MemoryStorage>,
        durable: Arc<FileStorage>,
        clock: Arc<ManualClock>,
        dir: PathBuf,
    ) -> Self {
        let app = AppState::new(
            Backends {
                remote: Arc::clone(&remote),
                session: Arc::clone(&session) as Arc<dyn LocalStorage>,
                durable: Arc::clone(&durable) as Arc<dyn LocalStorage>,
                clock: Arc::clone(&clock) as Arc<dyn Clock>,
            },
            AppOptions {
                locale: Locale::En,
                product_limit: None,
            },
        );
        Self {
            app,
            remote,
            session,
            durable,
            clock,
            dir,
        }
    }

    /// A second application over the same remote, storage and clock, as if
    /// the storefront had been restarted.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self::with_parts(
            Arc::clone(&self.remote),
            Arc::clone(&self.session),
            Arc::clone(&self.durable),
            Arc::clone(&self.clock),
            self.dir.clone(),
        )
    }

    /// Publish the standard fixture catalog on the remote.
    pub fn seed_catalog(&self) {
        let (products, categories, subcategories) = fixture_catalog();
        self.remote.set_products(products);
        self.remote.set_categories(categories);
        self.remote.set_subcategories(subcategories);
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        // Restarted contexts share the directory; the last one out removes
        // it. Each context holds two references: its own and its cart's.
        if Arc::strong_count(&self.durable) <= 2 {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}

/// Fixed starting instant for the manual clock.
#[must_use]
pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_735_689_600_000).unwrap_or_default()
}

/// Products, categories and subcategories used across tests.
///
/// # Panics
///
/// Panics if the fixture JSON does not decode.
#[must_use]
#[allow(clippy::expect_used)]
pub fn fixture_catalog() -> (Vec<Product>, Vec<Category>, Vec<Subcategory>) {
    let products = json!([
        {"id": "p-lamp", "name": "Desk Lamp", "price": 39.9, "category": "home", "image": "💡",
         "rating": 4.4, "reviews": 18, "isFlashDeal": true},
        {"id": "p-tee", "name": "Cotton Tee", "price": 15, "originalPrice": 20, "category": "fashion",
         "image": "👕", "badge": "sale"},
        {"id": "p-ball", "name": "Tennis Balls", "price": 6.5, "category": "sports", "image": "🎾",
         "showInHero": true}
    ]);
    let categories = json!([
        {"id": "home", "name": "Home", "slug": "home", "icon": "🏠", "showOnHome": true},
        {"id": "fashion", "name": "Fashion", "slug": "fashion", "icon": "👗"},
        {"id": "sports", "name": "Sports", "slug": "sports", "icon": "⚽"}
    ]);
    let subcategories = json!([
        {"id": "lighting", "name": "Lighting", "slug": "lighting", "categoryId": "home"}
    ]);

    (
        serde_json::from_value(products).expect("fixture products"),
        serde_json::from_value(categories).expect("fixture categories"),
        serde_json::from_value(subcategories).expect("fixture subcategories"),
    )
}

/// Cart input for a fixture product.
///
/// # Panics
///
/// Panics if `id` is not a fixture product.
#[must_use]
#[allow(clippy::expect_used)]
pub fn cart_item(id: &str, variant: Option<&str>) -> NewCartItem {
    let (products, _, _) = fixture_catalog();
    let product = products
        .iter()
        .find(|p| p.id.as_str() == id)
        .expect("unknown fixture product");
    NewCartItem::from_product(product, variant.map(str::to_owned))
}
