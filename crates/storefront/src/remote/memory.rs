//! In-process real-time database.
//!
//! Behaves like the hosted database from the storefront's point of view:
//! subscriptions receive the current collection immediately and after every
//! publish, documents are replaced wholesale, messages get generated keys.
//! Going [offline](MemoryRemote::set_offline) makes every call fail, which
//! is how the degradation paths are exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bazaar_core::{
    CartItem, Category, ContactMessage, MessageId, Product, RemoteCart, Subcategory, UserId,
    UserProfile,
};
use chrono::Utc;
use tracing::debug;

use super::{Listener, ProductQuery, RemoteDataSource, RemoteError, Subscription};

/// In-memory implementation of [`RemoteDataSource`].
///
/// Cheap to clone; clones share the same database.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    products: Mutex<Channel<Product>>,
    categories: Mutex<Channel<Category>>,
    subcategories: Mutex<Channel<Subcategory>>,
    documents: Mutex<Documents>,
    offline: AtomicBool,
    next_listener: AtomicU64,
    cart_writes: AtomicUsize,
}

#[derive(Default)]
struct Documents {
    carts: HashMap<UserId, RemoteCart>,
    profiles: HashMap<UserId, UserProfile>,
    messages: Vec<(MessageId, ContactMessage)>,
}

struct Registration<T> {
    listener: Listener<T>,
    active: Arc<AtomicBool>,
    limit: Option<usize>,
}

struct Channel<T> {
    value: Vec<T>,
    listeners: HashMap<u64, Registration<T>>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            value: Vec::new(),
            listeners: HashMap::new(),
        }
    }
}

impl<T: Clone> Channel<T> {
    fn view(&self, limit: Option<usize>) -> Vec<T> {
        let take = limit.unwrap_or(self.value.len());
        self.value.iter().take(take).cloned().collect()
    }
}

/// Records that live in a subscribable collection.
trait Stored: Clone + Send + Sync + 'static {
    fn channel(shared: &Shared) -> &Mutex<Channel<Self>>;
}

impl Stored for Product {
    fn channel(shared: &Shared) -> &Mutex<Channel<Self>> {
        &shared.products
    }
}

impl Stored for Category {
    fn channel(shared: &Shared) -> &Mutex<Channel<Self>> {
        &shared.categories
    }
}

impl Stored for Subcategory {
    fn channel(shared: &Shared) -> &Mutex<Channel<Self>> {
        &shared.subcategories
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn offline_error() -> RemoteError {
    RemoteError::Unavailable("memory remote is offline".to_string())
}

type Delivery<T> = (Listener<T>, Arc<AtomicBool>, Vec<T>);

impl MemoryRemote {
    /// An empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the products collection and notify subscribers.
    pub fn set_products(&self, products: Vec<Product>) {
        self.publish(products);
    }

    /// Replace the categories collection and notify subscribers.
    pub fn set_categories(&self, categories: Vec<Category>) {
        self.publish(categories);
    }

    /// Replace the subcategories collection and notify subscribers.
    pub fn set_subcategories(&self, subcategories: Vec<Subcategory>) {
        self.publish(subcategories);
    }

    /// Seed a user's cart mirror without counting it as a client write.
    pub fn seed_cart(&self, user: &UserId, items: Vec<CartItem>) {
        lock(&self.shared.documents).carts.insert(
            user.clone(),
            RemoteCart {
                items,
                updated_at: Utc::now(),
            },
        );
    }

    /// Current cart mirror for `user`.
    #[must_use]
    pub fn cart(&self, user: &UserId) -> Option<RemoteCart> {
        lock(&self.shared.documents).carts.get(user).cloned()
    }

    /// Number of successful `write_cart` calls so far.
    #[must_use]
    pub fn cart_writes(&self) -> usize {
        self.shared.cart_writes.load(Ordering::SeqCst)
    }

    /// Stored profile for `user`.
    #[must_use]
    pub fn profile(&self, user: &UserId) -> Option<UserProfile> {
        lock(&self.shared.documents).profiles.get(user).cloned()
    }

    /// All appended messages in arrival order.
    #[must_use]
    pub fn messages(&self) -> Vec<(MessageId, ContactMessage)> {
        lock(&self.shared.documents).messages.clone()
    }

    /// Number of live subscriptions across all collections.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.shared.products).listeners.len()
            + lock(&self.shared.categories).listeners.len()
            + lock(&self.shared.subcategories).listeners.len()
    }

    /// Simulate losing (or regaining) the connection.
    ///
    /// While offline every call fails with [`RemoteError::Unavailable`] and
    /// publishes are not delivered. Coming back online re-delivers the
    /// current collections to every subscriber.
    pub fn set_offline(&self, offline: bool) {
        let was_offline = self.shared.offline.swap(offline, Ordering::SeqCst);
        if was_offline && !offline {
            debug!("memory remote back online, re-delivering collections");
            self.redeliver::<Product>();
            self.redeliver::<Category>();
            self.redeliver::<Subcategory>();
        }
    }

    fn is_offline(&self) -> bool {
        self.shared.offline.load(Ordering::SeqCst)
    }

    fn publish<T: Stored>(&self, items: Vec<T>) {
        let deliveries = {
            let mut channel = lock(T::channel(&self.shared));
            channel.value = items;
            Self::pending_deliveries(&channel)
        };
        if !self.is_offline() {
            Self::deliver(deliveries);
        }
    }

    fn redeliver<T: Stored>(&self) {
        let deliveries = Self::pending_deliveries(&lock(T::channel(&self.shared)));
        Self::deliver(deliveries);
    }

    fn pending_deliveries<T: Stored>(channel: &Channel<T>) -> Vec<Delivery<T>> {
        channel
            .listeners
            .values()
            .map(|r| (Arc::clone(&r.listener), Arc::clone(&r.active), channel.view(r.limit)))
            .collect()
    }

    // Listeners run outside the channel lock so they may call back in.
    fn deliver<T: Stored>(deliveries: Vec<Delivery<T>>) {
        for (listener, active, items) in deliveries {
            if active.load(Ordering::SeqCst) {
                listener(Ok(items));
            }
        }
    }

    fn subscribe<T: Stored>(&self, limit: Option<usize>, listener: Listener<T>) -> Subscription {
        let id = self.shared.next_listener.fetch_add(1, Ordering::SeqCst);
        let active = Arc::new(AtomicBool::new(true));

        let initial = {
            let mut channel = lock(T::channel(&self.shared));
            channel.listeners.insert(
                id,
                Registration {
                    listener: Arc::clone(&listener),
                    active: Arc::clone(&active),
                    limit,
                },
            );
            channel.view(limit)
        };

        if self.is_offline() {
            listener(Err(offline_error()));
        } else {
            listener(Ok(initial));
        }

        let shared = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(shared) = shared.upgrade() {
                lock(T::channel(&shared)).listeners.remove(&id);
            }
        })
    }
}

impl RemoteDataSource for MemoryRemote {
    fn subscribe_to_products(
        &self,
        query: ProductQuery,
        listener: Listener<Product>,
    ) -> Subscription {
        self.subscribe(query.limit, listener)
    }

    fn subscribe_to_categories(&self, listener: Listener<Category>) -> Subscription {
        self.subscribe(None, listener)
    }

    fn subscribe_to_subcategories(&self, listener: Listener<Subcategory>) -> Subscription {
        self.subscribe(None, listener)
    }

    async fn read_cart(&self, user: &UserId) -> Result<Option<RemoteCart>, RemoteError> {
        if self.is_offline() {
            return Err(offline_error());
        }
        Ok(self.cart(user))
    }

    async fn write_cart(&self, user: &UserId, items: &[CartItem]) -> Result<(), RemoteError> {
        if self.is_offline() {
            return Err(offline_error());
        }
        lock(&self.shared.documents).carts.insert(
            user.clone(),
            RemoteCart {
                items: items.to_vec(),
                updated_at: Utc::now(),
            },
        );
        self.shared.cart_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_user_profile(&self, user: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        if self.is_offline() {
            return Err(offline_error());
        }
        Ok(self.profile(user))
    }

    async fn write_user_profile(
        &self,
        user: &UserId,
        profile: &UserProfile,
    ) -> Result<(), RemoteError> {
        if self.is_offline() {
            return Err(offline_error());
        }
        lock(&self.shared.documents)
            .profiles
            .insert(user.clone(), profile.clone());
        Ok(())
    }

    async fn append_message(&self, message: &ContactMessage) -> Result<MessageId, RemoteError> {
        if self.is_offline() {
            return Err(offline_error());
        }
        let id = MessageId::new(format!("msg-{}", uuid::Uuid::new_v4().simple()));
        lock(&self.shared.documents)
            .messages
            .push((id.clone(), message.clone()));
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use bazaar_core::{CategoryId, Price, ProductId};

    use super::*;

    fn product(id: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: id.to_string(),
            price: Price::from_cents(500),
            original_price: None,
            category: "misc".into(),
            image: "📦".into(),
            description: String::new(),
            rating: 0.0,
            reviews: 0,
            badge: None,
            is_flash_deal: false,
            show_in_hero: false,
        }
    }

    fn recorder<T: Send + 'static>() -> (Listener<T>, Arc<Mutex<Vec<Result<Vec<T>, String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Listener<T> = Arc::new(move |result: Result<Vec<T>, RemoteError>| {
            sink.lock().unwrap().push(result.map_err(|e| e.to_string()));
        });
        (listener, seen)
    }

    #[test]
    fn test_subscribe_delivers_current_then_updates() {
        let remote = MemoryRemote::new();
        remote.set_products(vec![product("a")]);

        let (listener, seen) = recorder::<Product>();
        let subscription = remote.subscribe_to_products(ProductQuery::default(), listener);
        remote.set_products(vec![product("a"), product("b")]);

        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert_eq!(seen[1].as_ref().unwrap().len(), 2);
        }

        subscription.unsubscribe();
        remote.set_products(Vec::new());
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(remote.listener_count(), 0);
    }

    #[test]
    fn test_product_limit_applies_to_every_delivery() {
        let remote = MemoryRemote::new();
        remote.set_products(vec![product("a"), product("b"), product("c")]);

        let (listener, seen) = recorder::<Product>();
        let _subscription =
            remote.subscribe_to_products(ProductQuery { limit: Some(2) }, listener);
        remote.set_products(vec![product("d"), product("e"), product("f")]);

        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|r| r.as_ref().unwrap().len() == 2));
    }

    #[test]
    fn test_offline_subscribe_reports_error_then_recovers() {
        let remote = MemoryRemote::new();
        remote.set_categories(vec![Category {
            id: CategoryId::new("c1"),
            name: "Toys".into(),
            slug: "toys".into(),
            icon: "🧸".into(),
            show_on_home: true,
        }]);
        remote.set_offline(true);

        let (listener, seen) = recorder::<Category>();
        let _subscription = remote.subscribe_to_categories(listener);
        remote.set_offline(false);

        let seen = seen.lock().unwrap();
        assert!(seen[0].is_err());
        assert_eq!(seen[1].as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_documents_round_trip() {
        let remote = MemoryRemote::new();
        let user = UserId::new("u1");
        assert!(remote.read_cart(&user).await.unwrap().is_none());

        remote.write_cart(&user, &[]).await.unwrap();
        assert!(remote.read_cart(&user).await.unwrap().unwrap().items.is_empty());
        assert_eq!(remote.cart_writes(), 1);

        remote.set_offline(true);
        assert!(matches!(
            remote.write_cart(&user, &[]).await,
            Err(RemoteError::Unavailable(_))
        ));
        assert_eq!(remote.cart_writes(), 1);
    }
}
