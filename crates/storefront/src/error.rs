//! Unified error handling with Sentry integration.
//!
//! The stores never return errors: they degrade and log. `StorefrontError`
//! collects the failures of the fallible edges (configuration, services,
//! direct remote calls) for callers such as the CLI.

use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::services::auth::{AuthError, AuthOperation, Locale};
use crate::services::support::FormError;
use crate::storage::StorageError;

/// Top-level error type for the storefront.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote database operation failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Authentication provider reported a failure.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A submitted form was rejected.
    #[error("Form error: {0}")]
    Form(#[from] FormError),
}

impl StorefrontError {
    /// Whether this error is worth an error-tracking event.
    ///
    /// User mistakes (bad credentials, invalid forms) are not.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Storage(_) => true,
            Self::Remote(err) => !matches!(err, RemoteError::PermissionDenied(_)),
            Self::Form(err) => err.is_reportable(),
            Self::Auth(_) => false,
        }
    }

    /// Capture to Sentry when reportable and log either way.
    pub fn report(&self) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        } else {
            tracing::debug!(error = %self, "Storefront error (not reported)");
        }
    }

    /// Text safe to show a shopper.
    ///
    /// Internal error details are not exposed.
    #[must_use]
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            Self::Auth(err) => err.user_message(locale, AuthOperation::SignIn),
            Self::Form(err) => err.user_message(locale).to_string(),
            Self::Remote(RemoteError::PermissionDenied(_)) => match locale {
                Locale::En => "You don't have permission to do that.".to_string(),
                Locale::Es => "No tienes permiso para hacer eso.".to_string(),
            },
            Self::Config(_) | Self::Remote(_) | Self::Storage(_) => match locale {
                Locale::En => "Something went wrong. Please try again.".to_string(),
                Locale::Es => "Algo salió mal. Inténtalo de nuevo.".to_string(),
            },
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "p-123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storefront_error_display() {
        let err = StorefrontError::Remote(RemoteError::Unavailable("offline".to_string()));
        assert_eq!(err.to_string(), "Remote error: remote unavailable: offline");

        let err = StorefrontError::Config(ConfigError::MissingEnvVar {
            key: "BAZAAR_DATABASE_URL",
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: BAZAAR_DATABASE_URL is not set"
        );
    }

    #[test]
    fn test_user_errors_are_not_reported() {
        assert!(!StorefrontError::Auth(AuthError::WrongPassword).is_reportable());
        assert!(!StorefrontError::Form(FormError::MissingName).is_reportable());
        assert!(
            !StorefrontError::Remote(RemoteError::PermissionDenied("rules".into())).is_reportable()
        );
        assert!(StorefrontError::Remote(RemoteError::Unavailable("x".into())).is_reportable());
    }

    #[test]
    fn test_user_message_hides_internals() {
        let err = StorefrontError::Remote(RemoteError::Status {
            status: 500,
            message: "stack trace here".to_string(),
        });
        let message = err.user_message(Locale::En);
        assert!(!message.contains("stack trace"));
        assert_eq!(
            StorefrontError::Remote(RemoteError::Unavailable(String::new())).user_message(Locale::Es),
            "Algo salió mal. Inténtalo de nuevo."
        );
    }
}
