//! Bazaar Storefront library.
//!
//! Client-side state for the storefront: a catalog cache with
//! stale-while-revalidate semantics, an optimistic cart store mirrored to the
//! remote database, and the services the pages call into.
//!
//! # Architecture
//!
//! - [`remote`] - The remote real-time database (trait + Firebase REST and
//!   in-memory implementations)
//! - [`storage`] - Local key-value persistence (session and durable)
//! - [`catalog`] - Snapshot cache and the live [`catalog::CatalogStore`]
//! - [`cart`] - The [`cart::CartStore`] and its login merge protocol
//! - [`sync`] - Best-effort side channel for fire-and-forget remote writes
//! - [`services`] - Auth error messages, support messages, user profiles
//! - [`state`] - Composition root owning one instance of each store

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod remote;
pub mod services;
pub mod state;
pub mod storage;
pub mod sync;
