//! Auth error message lookup.
//!
//! # Usage
//!
//! ```bash
//! BAZAAR_LOCALE=es bazaar auth-message auth/too-many-requests --operation sign-up
//! ```

use bazaar_storefront::services::auth::{AuthError, AuthOperation, Locale};

use super::CliError;

fn parse_operation(operation: &str) -> Result<AuthOperation, CliError> {
    match operation {
        "sign-in" => Ok(AuthOperation::SignIn),
        "sign-up" => Ok(AuthOperation::SignUp),
        "password-reset" => Ok(AuthOperation::PasswordReset),
        other => Err(CliError::InvalidArgument(format!(
            "operation must be sign-in, sign-up or password-reset, got {other}"
        ))),
    }
}

/// Print the localized message for `code`.
///
/// The locale comes from `BAZAAR_LOCALE` (default `en`).
pub fn show_message(code: &str, operation: &str) -> Result<(), CliError> {
    let operation = parse_operation(operation)?;
    let locale = std::env::var("BAZAAR_LOCALE")
        .ok()
        .map_or(Ok(Locale::default()), |value| value.parse::<Locale>())
        .map_err(CliError::InvalidArgument)?;

    let error = AuthError::from_code(code);
    tracing::debug!(code = error.code(), %locale, "resolved auth error");

    #[allow(clippy::print_stdout)]
    {
        println!("{}", error.user_message(locale, operation));
    }
    Ok(())
}
