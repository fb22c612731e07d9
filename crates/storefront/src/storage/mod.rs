//! Local key-value persistence.
//!
//! The stores persist two things locally:
//!
//! - [`keys::CATALOG_SNAPSHOT`] - a session-scoped catalog snapshot (the
//!   cache layer enforces its 5-minute freshness, not the storage)
//! - [`keys::CART`] - the durable shopping cart
//!
//! Access is synchronous. [`MemoryStorage`] stands in for session storage and
//! [`FileStorage`] for storage that survives restarts.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Well-known storage keys.
pub mod keys {
    /// Session-scoped catalog snapshot.
    pub const CATALOG_SNAPSHOT: &str = "catalog_cache";
    /// Durable cart state.
    pub const CART: &str = "cart-storage";
}

/// Errors raised by a [`LocalStorage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing the value would exceed the backend's quota.
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// The backend has been disabled (private browsing, user setting).
    #[error("storage is disabled")]
    Disabled,

    /// The key cannot be represented by this backend.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Underlying I/O failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Synchronous string key-value store.
pub trait LocalStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected (quota, disabled, I/O).
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
