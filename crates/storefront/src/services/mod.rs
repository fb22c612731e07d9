//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Provider error codes to localized user-facing messages
//! - `support` - Contact form and support chat submissions
//! - `profile` - User profile load/create and update

pub mod auth;
pub mod profile;
pub mod support;

pub use profile::ProfileService;
pub use support::{ContactForm, FormError, SupportService};
