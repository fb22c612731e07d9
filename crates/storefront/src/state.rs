//! Application state shared by every consumer.
//!
//! The composition root: it owns exactly one catalog store, one cart store
//! and the services, and is handed to whatever layer drives them.

use std::sync::Arc;

use crate::cart::CartStore;
use crate::catalog::{CatalogStore, SnapshotCache};
use crate::clock::{Clock, SystemClock};
use crate::config::StorefrontConfig;
use crate::remote::{FirebaseClient, ProductQuery, RemoteDataSource};
use crate::services::auth::Locale;
use crate::services::{ProfileService, SupportService};
use crate::storage::{FileStorage, LocalStorage, StorageError};

/// Knobs that are not dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppOptions {
    pub locale: Locale,
    pub product_limit: Option<usize>,
}

/// Where state lives.
pub struct Backends<R> {
    pub remote: Arc<R>,
    /// Storage for the catalog snapshot.
    pub session: Arc<dyn LocalStorage>,
    /// Storage for the cart.
    pub durable: Arc<dyn LocalStorage>,
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across all consumers.
///
/// This struct is cheaply cloneable via `Arc`.
pub struct AppState<R> {
    inner: Arc<AppStateInner<R>>,
}

struct AppStateInner<R> {
    options: AppOptions,
    remote: Arc<R>,
    catalog: CatalogStore<R>,
    cart: CartStore<R>,
    support: SupportService<R>,
    profiles: ProfileService<R>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteDataSource> AppState<R> {
    /// Wire the stores and services onto `backends`.
    ///
    /// The catalog is not initialized; call `catalog().init()` when ready.
    #[must_use]
    pub fn new(backends: Backends<R>, options: AppOptions) -> Self {
        let Backends {
            remote,
            session,
            durable,
            clock,
        } = backends;

        let cache = SnapshotCache::new(session, Arc::clone(&clock));
        let query = ProductQuery {
            limit: options.product_limit,
        };

        Self {
            inner: Arc::new(AppStateInner {
                options,
                catalog: CatalogStore::new(Arc::clone(&remote), cache, query),
                cart: CartStore::new(Arc::clone(&remote), durable),
                support: SupportService::new(Arc::clone(&remote), Arc::clone(&clock)),
                profiles: ProfileService::new(Arc::clone(&remote), clock),
                remote,
            }),
        }
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        self.inner.options.locale
    }

    /// The remote database the stores talk to.
    #[must_use]
    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogStore<R> {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore<R> {
        &self.inner.cart
    }

    #[must_use]
    pub fn support(&self) -> &SupportService<R> {
        &self.inner.support
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileService<R> {
        &self.inner.profiles
    }
}

impl AppState<FirebaseClient> {
    /// State backed by the configured database and the local data directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the data directory cannot be created.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, StorageError> {
        let storage: Arc<dyn LocalStorage> = Arc::new(FileStorage::open(&config.data_dir)?);
        let backends = Backends {
            remote: Arc::new(FirebaseClient::new(&config.database)),
            session: Arc::clone(&storage),
            durable: storage,
            clock: Arc::new(SystemClock),
        };
        let options = AppOptions {
            locale: config.locale,
            product_limit: Some(config.product_limit),
        };
        Ok(Self::new(backends, options))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{NewCartItem, Price, ProductId, UserId};
    use chrono::Utc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryStorage;

    fn state() -> AppState<MemoryRemote> {
        AppState::new(
            Backends {
                remote: Arc::new(MemoryRemote::new()),
                session: Arc::new(MemoryStorage::new()),
                durable: Arc::new(MemoryStorage::new()),
                clock: Arc::new(ManualClock::new(Utc::now())),
            },
            AppOptions {
                locale: Locale::Es,
                product_limit: Some(10),
            },
        )
    }

    #[tokio::test]
    async fn test_clones_share_one_cart() {
        let app = state();
        let other = app.clone();

        app.cart().add_to_cart(NewCartItem {
            id: ProductId::new("p1"),
            name: "Mug".into(),
            price: Price::from_cents(900),
            image: "☕".into(),
            variant_key: None,
        });
        other.cart().set_user_id(Some(UserId::new("u1"))).await;
        app.cart().flush_remote().await;

        assert_eq!(other.cart().total_items(), 1);
        assert_eq!(app.remote().cart(&UserId::new("u1")).unwrap().items.len(), 1);
        assert_eq!(app.locale(), Locale::Es);
    }

    #[test]
    fn test_catalog_initializes_from_shared_remote() {
        let app = state();
        app.catalog().init();
        assert!(app.catalog().is_initialized());
        assert!(app.catalog().current().uses_fallback());
    }
}
