//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `storefront` - Catalog cache, cart store and remote data source clients
//! - `cli` - Command-line driver for the storefront stores
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and usable anywhere.
//!
//! # Modules
//!
//! - [`types`] - Ids, prices, emails, catalog records, cart lines, profiles
//!   and support messages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
