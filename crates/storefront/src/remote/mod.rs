//! The remote real-time database.
//!
//! # Architecture
//!
//! - [`RemoteDataSource`] is the whole contract the stores depend on:
//!   push subscriptions for the catalog collections plus get/set/push calls
//!   for carts, profiles and messages
//! - [`FirebaseClient`] talks to a Firebase Realtime Database over its REST
//!   and event-stream API
//! - [`MemoryRemote`] is an in-process database with the same push semantics,
//!   used by tests and offline demos
//!
//! Subscriptions hand back a [`Subscription`] disposer. Dropping it or
//! calling [`Subscription::unsubscribe`] (any number of times) stops delivery.

mod firebase;
mod memory;

pub use firebase::FirebaseClient;
pub use memory::MemoryRemote;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use bazaar_core::{
    CartItem, Category, ContactMessage, MessageId, Product, RemoteCart, Subcategory, UserId,
    UserProfile,
};
use thiserror::Error;

/// Errors that can occur when talking to the remote database.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("invalid database URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The database answered with a non-success status.
    #[error("database returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Security rules rejected the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The database cannot be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The server closed a subscription (`cancel`, `auth_revoked`).
    #[error("subscription closed by server: {0}")]
    SubscriptionClosed(String),
}

/// The catalog collections that support push subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Products,
    Categories,
    Subcategories,
}

impl Collection {
    /// Database path of the collection.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Subcategories => "subcategories",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Options for the products subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductQuery {
    /// Deliver at most this many products.
    pub limit: Option<usize>,
}

/// Callback receiving the full collection every time it changes.
pub type Listener<T> = Arc<dyn Fn(Result<Vec<T>, RemoteError>) + Send + Sync>;

type Disposer = Box<dyn FnOnce() + Send>;

/// Handle to a live subscription.
///
/// Unsubscribing is idempotent and also happens on drop, so a handle owned by
/// a torn-down consumer can never deliver into a stale context.
pub struct Subscription {
    disposer: Mutex<Option<Disposer>>,
}

impl Subscription {
    /// Wrap the function that tears the subscription down.
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Mutex::new(Some(Box::new(disposer))),
        }
    }

    /// A subscription with nothing to tear down.
    #[must_use]
    pub const fn noop() -> Self {
        Self {
            disposer: Mutex::new(None),
        }
    }

    /// Stop delivery. Safe to call more than once.
    pub fn unsubscribe(&self) {
        let disposer = self
            .disposer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dispose) = disposer {
            dispose();
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has not run yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.disposer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Everything the storefront needs from the remote database.
///
/// Subscriptions deliver the current value promptly after registration and
/// again after every change. Implementations must be thread-safe; the async
/// methods return `Send` futures so writes can run on background tasks.
pub trait RemoteDataSource: Send + Sync + 'static {
    /// Push updates of the products collection.
    fn subscribe_to_products(
        &self,
        query: ProductQuery,
        listener: Listener<Product>,
    ) -> Subscription;

    /// Push updates of the categories collection.
    fn subscribe_to_categories(&self, listener: Listener<Category>) -> Subscription;

    /// Push updates of the subcategories collection.
    fn subscribe_to_subcategories(&self, listener: Listener<Subcategory>) -> Subscription;

    /// Fetch a user's cart mirror, `None` if the user never synced one.
    fn read_cart(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<RemoteCart>, RemoteError>> + Send;

    /// Replace a user's cart mirror with `items`.
    fn write_cart(
        &self,
        user: &UserId,
        items: &[CartItem],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Fetch a user's profile.
    fn read_user_profile(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<UserProfile>, RemoteError>> + Send;

    /// Replace a user's profile.
    fn write_user_profile(
        &self,
        user: &UserId,
        profile: &UserProfile,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Append a contact/support message, returning its generated key.
    fn append_message(
        &self,
        message: &ContactMessage,
    ) -> impl Future<Output = Result<MessageId, RemoteError>> + Send;
}
