//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for the storefront's domain
//! concepts and the records exchanged with the remote database.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod id;
pub mod message;
pub mod price;
pub mod profile;

pub use cart::{CartItem, NewCartItem, RemoteCart};
pub use catalog::{Badge, Catalog, Category, Product, Subcategory};
pub use email::{Email, EmailError};
pub use id::*;
pub use message::{ContactMessage, MessageKind};
pub use price::Price;
pub use profile::{ShippingAddress, UserProfile};
