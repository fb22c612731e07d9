//! CLI command implementations.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod contact;

use bazaar_storefront::error::StorefrontError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// A storefront operation failed.
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// A command-line argument was not acceptable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The product is not in the catalog.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
}
