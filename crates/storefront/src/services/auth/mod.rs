//! Authentication error reporting.
//!
//! Sign-in itself belongs to the identity provider. This module turns the
//! provider's error codes into text a shopper can act on, in the configured
//! language.

mod error;

pub use error::AuthError;

use std::fmt;
use std::str::FromStr;

/// Language of user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl FromStr for Locale {
    type Err = String;

    /// Accepts a language tag such as `es`, `ES` or `es-MX`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let language = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "en" => Ok(Self::En),
            "es" => Ok(Self::Es),
            _ => Err(format!("unsupported locale '{s}', expected 'en' or 'es'")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::En => "en",
            Self::Es => "es",
        })
    }
}

/// The flow that produced an auth error; picks the generic fallback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    SignIn,
    SignUp,
    PasswordReset,
}

impl AuthOperation {
    const fn fallback(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::SignIn, Locale::En) => "Could not sign in. Please try again.",
            (Self::SignIn, Locale::Es) => "No se pudo iniciar sesión. Inténtalo de nuevo.",
            (Self::SignUp, Locale::En) => "Could not create your account. Please try again.",
            (Self::SignUp, Locale::Es) => "No se pudo crear tu cuenta. Inténtalo de nuevo.",
            (Self::PasswordReset, Locale::En) => {
                "Could not send the password reset email. Please try again."
            }
            (Self::PasswordReset, Locale::Es) => {
                "No se pudo enviar el correo para restablecer la contraseña. Inténtalo de nuevo."
            }
        }
    }
}

impl AuthError {
    /// Friendly text for this error during `operation`.
    #[must_use]
    pub fn user_message(&self, locale: Locale, operation: AuthOperation) -> String {
        self.known_message(locale)
            .unwrap_or_else(|| operation.fallback(locale))
            .to_string()
    }

    const fn known_message(&self, locale: Locale) -> Option<&'static str> {
        let message = match locale {
            Locale::En => match self {
                Self::InvalidEmail => "The email address is not valid.",
                Self::UserDisabled => "This account has been disabled.",
                Self::UserNotFound => "No account was found with this email.",
                Self::WrongPassword => "The password is incorrect.",
                Self::InvalidCredential => "The email or password is incorrect.",
                Self::EmailAlreadyInUse => "An account with this email already exists.",
                Self::WeakPassword => "The password must be at least 6 characters long.",
                Self::TooManyRequests => "Too many attempts. Please wait a moment and try again.",
                Self::NetworkRequestFailed => "Network error. Check your connection and try again.",
                Self::PopupClosedByUser => "The sign-in window was closed before finishing.",
                Self::RequiresRecentLogin => "Please sign in again to continue.",
                Self::MissingEmail => "Please enter your email address.",
                Self::Unknown(_) => return None,
            },
            Locale::Es => match self {
                Self::InvalidEmail => "El correo electrónico no es válido.",
                Self::UserDisabled => "Esta cuenta ha sido deshabilitada.",
                Self::UserNotFound => "No existe una cuenta con este correo.",
                Self::WrongPassword => "La contraseña es incorrecta.",
                Self::InvalidCredential => "El correo o la contraseña son incorrectos.",
                Self::EmailAlreadyInUse => "Ya existe una cuenta con este correo.",
                Self::WeakPassword => "La contraseña debe tener al menos 6 caracteres.",
                Self::TooManyRequests => "Demasiados intentos. Espera un momento e inténtalo de nuevo.",
                Self::NetworkRequestFailed => "Error de red. Revisa tu conexión e inténtalo de nuevo.",
                Self::PopupClosedByUser => "La ventana de inicio de sesión se cerró antes de terminar.",
                Self::RequiresRecentLogin => "Vuelve a iniciar sesión para continuar.",
                Self::MissingEmail => "Introduce tu correo electrónico.",
                Self::Unknown(_) => return None,
            },
        };
        Some(message)
    }
}
