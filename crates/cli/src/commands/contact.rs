//! Contact form submission.

use bazaar_core::MessageKind;
use bazaar_storefront::error::StorefrontError;
use bazaar_storefront::remote::FirebaseClient;
use bazaar_storefront::services::ContactForm;
use bazaar_storefront::state::AppState;

use super::CliError;

/// Validate and send a message, attributed to the cart's user if any.
///
/// Form problems are printed in the shopper's language.
pub async fn submit(
    state: &AppState<FirebaseClient>,
    name: String,
    email: String,
    message: String,
    subject: Option<String>,
    support: bool,
) -> Result<(), CliError> {
    let form = ContactForm {
        kind: if support {
            MessageKind::SupportChat
        } else {
            MessageKind::ContactForm
        },
        name,
        email,
        subject,
        message,
    };
    let user = state.cart().user_id();

    match state.support().submit(form, user.as_ref()).await {
        Ok(id) => {
            tracing::info!(message_id = %id, "message sent");
            Ok(())
        }
        Err(e) if !e.is_reportable() => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{}", e.user_message(state.locale()));
            }
            Err(CliError::InvalidArgument(e.to_string()))
        }
        Err(e) => Err(StorefrontError::from(e).into()),
    }
}
