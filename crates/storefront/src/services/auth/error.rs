//! Authentication error types.

use thiserror::Error;

/// Failures reported by the authentication provider.
///
/// Built from the provider's error code with [`AuthError::from_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,

    #[error("user disabled")]
    UserDisabled,

    #[error("user not found")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    /// Wrong email/password pair (providers that hide which one).
    #[error("invalid credential")]
    InvalidCredential,

    #[error("email already in use")]
    EmailAlreadyInUse,

    #[error("weak password")]
    WeakPassword,

    #[error("too many requests")]
    TooManyRequests,

    #[error("network request failed")]
    NetworkRequestFailed,

    #[error("popup closed by user")]
    PopupClosedByUser,

    #[error("requires recent login")]
    RequiresRecentLogin,

    #[error("missing email")]
    MissingEmail,

    /// A code this build does not know.
    #[error("auth error: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Map a provider error code, with or without the `auth/` prefix.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        match code.strip_prefix("auth/").unwrap_or(code) {
            "invalid-email" => Self::InvalidEmail,
            "user-disabled" => Self::UserDisabled,
            "user-not-found" => Self::UserNotFound,
            "wrong-password" => Self::WrongPassword,
            "invalid-credential" => Self::InvalidCredential,
            "email-already-in-use" => Self::EmailAlreadyInUse,
            "weak-password" => Self::WeakPassword,
            "too-many-requests" => Self::TooManyRequests,
            "network-request-failed" => Self::NetworkRequestFailed,
            "popup-closed-by-user" => Self::PopupClosedByUser,
            "requires-recent-login" => Self::RequiresRecentLogin,
            "missing-email" => Self::MissingEmail,
            _ => Self::Unknown(code.to_string()),
        }
    }

    /// The provider code, without prefix.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidEmail => "invalid-email",
            Self::UserDisabled => "user-disabled",
            Self::UserNotFound => "user-not-found",
            Self::WrongPassword => "wrong-password",
            Self::InvalidCredential => "invalid-credential",
            Self::EmailAlreadyInUse => "email-already-in-use",
            Self::WeakPassword => "weak-password",
            Self::TooManyRequests => "too-many-requests",
            Self::NetworkRequestFailed => "network-request-failed",
            Self::PopupClosedByUser => "popup-closed-by-user",
            Self::RequiresRecentLogin => "requires-recent-login",
            Self::MissingEmail => "missing-email",
            Self::Unknown(code) => code,
        }
    }
}
