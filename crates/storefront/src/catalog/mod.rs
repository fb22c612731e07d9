//! Product catalog with stale-while-revalidate caching.
//!
//! # Architecture
//!
//! - [`SnapshotCache`] keeps one time-bounded catalog snapshot in local
//!   storage
//! - [`CatalogStore`] serves the snapshot first, then keeps the three
//!   collections current from live remote subscriptions
//! - [`fallback`] is the bundled dataset used for any collection that is
//!   empty or unreachable remotely
//!
//! Readers observe [`CatalogState`] through a `tokio::sync::watch` channel.

mod cache;
pub mod fallback;

pub use cache::{CachedData, MAX_SNAPSHOT_BYTES, SNAPSHOT_TTL, SaveOutcome, SnapshotCache};

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use bazaar_core::{Catalog, Category, CategoryId, Product, ProductId, Subcategory};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::remote::{Collection, Listener, ProductQuery, RemoteDataSource, RemoteError, Subscription};

/// How long the subscriptions opened by [`CatalogStore::refresh`] live.
pub const REFRESH_WINDOW: Duration = Duration::from_secs(5);

/// Where a collection's current data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    /// Nothing received yet.
    #[default]
    Pending,
    /// Restored from the local snapshot.
    Cache,
    /// Delivered by the remote subscription.
    Live,
    /// The bundled dataset.
    Fallback,
}

/// Load status of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionStatus {
    pub source: Source,
    pub loaded: bool,
}

/// Everything readers see of the catalog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogState {
    pub catalog: Catalog,
    pub products: CollectionStatus,
    pub categories: CollectionStatus,
    pub subcategories: CollectionStatus,
}

impl CatalogState {
    fn statuses(&self) -> [CollectionStatus; 3] {
        [self.products, self.categories, self.subcategories]
    }

    /// All three collections have loaded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.statuses().iter().all(|s| s.loaded)
    }

    /// Share of collections loaded, from 0 to 100.
    #[must_use]
    pub fn progress(&self) -> f32 {
        let loaded = self.statuses().iter().filter(|s| s.loaded).count();
        #[allow(clippy::cast_precision_loss)] // at most 3
        let loaded = loaded as f32;
        loaded / 3.0 * 100.0
    }

    /// Whether any collection is showing bundled data.
    #[must_use]
    pub fn uses_fallback(&self) -> bool {
        self.statuses().iter().any(|s| s.source == Source::Fallback)
    }

    fn restore(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        let restored = CollectionStatus {
            source: Source::Cache,
            loaded: true,
        };
        self.products = restored;
        self.categories = restored;
        self.subcategories = restored;
    }

    fn reset_progress(&mut self) {
        self.products.loaded = false;
        self.categories.loaded = false;
        self.subcategories.loaded = false;
    }

    /// Look up a product by id.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.catalog.product(id)
    }

    /// Products of a category given by slug or id.
    #[must_use]
    pub fn products_in_category(&self, slug_or_id: &str) -> Vec<&Product> {
        let category = self
            .catalog
            .categories
            .iter()
            .find(|c| c.slug == slug_or_id || c.id.as_str() == slug_or_id);
        match category {
            Some(category) => self.catalog.products_in(category).collect(),
            None => self
                .catalog
                .products
                .iter()
                .filter(|p| p.category == slug_or_id)
                .collect(),
        }
    }
}

/// A catalog collection as seen by the store.
trait Record: Sized + PartialEq + Send + 'static {
    const COLLECTION: Collection;

    fn slot(state: &mut CatalogState) -> (&mut Vec<Self>, &mut CollectionStatus);

    fn fallback() -> Vec<Self>;
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;

    fn slot(state: &mut CatalogState) -> (&mut Vec<Self>, &mut CollectionStatus) {
        (&mut state.catalog.products, &mut state.products)
    }

    fn fallback() -> Vec<Self> {
        fallback::products()
    }
}

impl Record for Category {
    const COLLECTION: Collection = Collection::Categories;

    fn slot(state: &mut CatalogState) -> (&mut Vec<Self>, &mut CollectionStatus) {
        (&mut state.catalog.categories, &mut state.categories)
    }

    fn fallback() -> Vec<Self> {
        fallback::categories()
    }
}

impl Record for Subcategory {
    const COLLECTION: Collection = Collection::Subcategories;

    fn slot(state: &mut CatalogState) -> (&mut Vec<Self>, &mut CollectionStatus) {
        (&mut state.catalog.subcategories, &mut state.subcategories)
    }

    fn fallback() -> Vec<Self> {
        fallback::subcategories()
    }
}

/// The shared catalog.
///
/// Cheap to clone; clones share state and subscriptions. The live
/// subscriptions end when the last clone is dropped or on
/// [`close`](Self::close).
pub struct CatalogStore<R> {
    inner: Arc<Inner<R>>,
}

struct Inner<R> {
    remote: Arc<R>,
    cache: SnapshotCache,
    query: ProductQuery,
    state: watch::Sender<CatalogState>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<R> Clone for CatalogStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteDataSource> CatalogStore<R> {
    #[must_use]
    pub fn new(remote: Arc<R>, cache: SnapshotCache, query: ProductQuery) -> Self {
        let (state, _) = watch::channel(CatalogState::default());
        Self {
            inner: Arc::new(Inner {
                remote,
                cache,
                query,
                state,
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Serve a fresh snapshot if there is one, then subscribe to the remote.
    ///
    /// Calling `init` again replaces the live subscriptions.
    pub fn init(&self) {
        if let Some(cached) = self.inner.cache.get_cached_snapshot() {
            info!(
                products = cached.catalog.products.len(),
                categories = cached.catalog.categories.len(),
                "catalog restored from snapshot"
            );
            self.inner.state.send_modify(|state| state.restore(cached.catalog));
        }

        let subscriptions = self.open_subscriptions();
        let previous = std::mem::replace(
            &mut *self
                .inner
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            subscriptions,
        );
        drop(previous);
    }

    /// Drop the snapshot and reload every collection.
    ///
    /// The extra subscriptions opened here are torn down after
    /// [`REFRESH_WINDOW`] whether or not they delivered.
    pub fn refresh(&self) {
        info!("refreshing catalog");
        self.inner.cache.clear();
        self.inner.state.send_modify(CatalogState::reset_progress);

        let temporary = self.open_subscriptions();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(REFRESH_WINDOW).await;
                    drop(temporary);
                    debug!("refresh subscriptions closed");
                });
            }
            Err(_) => drop(temporary),
        }
    }

    /// Remove the persisted snapshot without touching the in-memory state.
    pub fn clear_snapshot(&self) {
        self.inner.cache.clear();
    }

    /// Stop the live subscriptions.
    pub fn close(&self) {
        let subscriptions = std::mem::take(
            &mut *self
                .inner
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        drop(subscriptions);
    }

    /// Watch the catalog state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.inner.state.subscribe()
    }

    /// A copy of the current state.
    #[must_use]
    pub fn current(&self) -> CatalogState {
        self.inner.state.borrow().clone()
    }

    /// Wait until every collection has loaded, up to `timeout`.
    ///
    /// Returns whether initialization happened in time.
    pub async fn wait_until_initialized(&self, timeout: Duration) -> bool {
        let mut state = self.subscribe();
        tokio::time::timeout(timeout, state.wait_for(CatalogState::is_initialized))
            .await
            .is_ok_and(|result| result.is_ok())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.state.borrow().is_initialized()
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        self.inner.state.borrow().progress()
    }

    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<Product> {
        self.inner.state.borrow().product(id).cloned()
    }

    #[must_use]
    pub fn products_in_category(&self, slug_or_id: &str) -> Vec<Product> {
        self.inner
            .state
            .borrow()
            .products_in_category(slug_or_id)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn subcategories_of(&self, category: &CategoryId) -> Vec<Subcategory> {
        self.inner
            .state
            .borrow()
            .catalog
            .subcategories_of(category)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn flash_deals(&self) -> Vec<Product> {
        self.inner.state.borrow().catalog.flash_deals().cloned().collect()
    }

    #[must_use]
    pub fn hero_products(&self) -> Vec<Product> {
        self.inner.state.borrow().catalog.hero_products().cloned().collect()
    }

    #[must_use]
    pub fn home_categories(&self) -> Vec<Category> {
        self.inner.state.borrow().catalog.home_categories().cloned().collect()
    }

    // Subscribing may deliver synchronously, so no store lock is held here.
    fn open_subscriptions(&self) -> Vec<Subscription> {
        let remote = &self.inner.remote;
        vec![
            remote.subscribe_to_products(self.inner.query, self.listener()),
            remote.subscribe_to_categories(self.listener()),
            remote.subscribe_to_subcategories(self.listener()),
        ]
    }

    fn listener<T: Record>(&self) -> Listener<T> {
        let inner: Weak<Inner<R>> = Arc::downgrade(&self.inner);
        Arc::new(move |result| {
            if let Some(inner) = inner.upgrade() {
                inner.apply(result);
            }
        })
    }
}

impl<R> Inner<R> {
    fn apply<T: Record>(&self, result: Result<Vec<T>, RemoteError>) {
        let collection = T::COLLECTION;
        let mut snapshot = None;

        self.state.send_modify(|state| {
            let (items, status) = T::slot(state);
            let changed = match result {
                Ok(list) if !list.is_empty() => {
                    debug!(%collection, count = list.len(), "collection received");
                    // A reload after `refresh` counts even when nothing differs.
                    let changed =
                        !status.loaded || status.source != Source::Live || *items != list;
                    *items = list;
                    status.source = Source::Live;
                    changed
                }
                Ok(_) => {
                    warn!(%collection, "remote collection empty, using bundled data");
                    *items = T::fallback();
                    status.source = Source::Fallback;
                    true
                }
                Err(e) if items.is_empty() => {
                    warn!(%collection, error = %e, "subscription failed, using bundled data");
                    *items = T::fallback();
                    status.source = Source::Fallback;
                    true
                }
                Err(e) => {
                    warn!(%collection, error = %e, "subscription failed, keeping current data");
                    false
                }
            };
            status.loaded = true;

            // An unchanged catalog keeps its original capture time.
            if changed && state.is_initialized() && !state.uses_fallback() {
                snapshot = Some(state.catalog.clone());
            }
        });

        if let Some(catalog) = snapshot {
            self.cache.save_snapshot(&catalog);
        }
    }
}
