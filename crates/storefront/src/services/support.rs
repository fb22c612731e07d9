//! Contact form and support chat submissions.

use std::sync::Arc;

use bazaar_core::{ContactMessage, Email, EmailError, MessageId, MessageKind, UserId};
use thiserror::Error;
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::remote::{RemoteDataSource, RemoteError};
use crate::services::auth::Locale;

/// Longest accepted message body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// What the shopper typed.
#[derive(Debug, Clone, Default)]
pub struct ContactForm {
    pub kind: MessageKind,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

/// Why a form was not accepted.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("name is required")]
    MissingName,

    #[error("message is required")]
    MissingMessage,

    #[error("message is {actual} characters, limit is {max}")]
    MessageTooLong { max: usize, actual: usize },

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("could not send message: {0}")]
    Remote(#[from] RemoteError),
}

impl FormError {
    /// Only delivery failures are worth an error report.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Text to show next to the form.
    #[must_use]
    pub const fn user_message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::MissingName, Locale::En) => "Please enter your name.",
            (Self::MissingName, Locale::Es) => "Introduce tu nombre.",
            (Self::MissingMessage, Locale::En) => "Please write a message.",
            (Self::MissingMessage, Locale::Es) => "Escribe un mensaje.",
            (Self::MessageTooLong { .. }, Locale::En) => {
                "Your message is too long. Please keep it under 2000 characters."
            }
            (Self::MessageTooLong { .. }, Locale::Es) => {
                "Tu mensaje es demasiado largo. Usa menos de 2000 caracteres."
            }
            (Self::InvalidEmail(_), Locale::En) => "Please enter a valid email address.",
            (Self::InvalidEmail(_), Locale::Es) => "Introduce un correo electrónico válido.",
            (Self::Remote(_), Locale::En) => {
                "We couldn't send your message. Please try again later."
            }
            (Self::Remote(_), Locale::Es) => {
                "No pudimos enviar tu mensaje. Inténtalo de nuevo más tarde."
            }
        }
    }
}

/// Validates and delivers contact/support messages.
pub struct SupportService<R> {
    remote: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: RemoteDataSource> SupportService<R> {
    #[must_use]
    pub fn new(remote: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { remote, clock }
    }

    /// Check `form` and build the message that would be stored.
    ///
    /// # Errors
    ///
    /// Returns the first problem found with the form.
    pub fn validate(&self, form: ContactForm, user: Option<&UserId>) -> Result<ContactMessage, FormError> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(FormError::MissingName);
        }
        let message = form.message.trim();
        if message.is_empty() {
            return Err(FormError::MissingMessage);
        }
        let length = message.chars().count();
        if length > MAX_MESSAGE_CHARS {
            return Err(FormError::MessageTooLong {
                max: MAX_MESSAGE_CHARS,
                actual: length,
            });
        }
        let email = Email::parse(&form.email)?;

        Ok(ContactMessage {
            kind: form.kind,
            user_id: user.cloned(),
            name: name.to_string(),
            email,
            subject: form
                .subject
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            message: message.to_string(),
            created_at: self.clock.now(),
            read: false,
        })
    }

    /// Validate `form` and append it to the remote messages.
    ///
    /// # Errors
    ///
    /// Returns `FormError` if the form is invalid or delivery fails.
    #[instrument(skip(self, form), fields(kind = ?form.kind))]
    pub async fn submit(&self, form: ContactForm, user: Option<&UserId>) -> Result<MessageId, FormError> {
        let message = self.validate(form, user)?;
        let id = self.remote.append_message(&message).await?;
        info!(message_id = %id, "support message stored");
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::clock::ManualClock;
    use crate::remote::MemoryRemote;

    fn service() -> (SupportService<MemoryRemote>, Arc<MemoryRemote>) {
        let remote = Arc::new(MemoryRemote::new());
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        ));
        (SupportService::new(Arc::clone(&remote), clock), remote)
    }

    fn form() -> ContactForm {
        ContactForm {
            kind: MessageKind::ContactForm,
            name: "  Ana  ".to_string(),
            email: "Ana@Example.com".to_string(),
            subject: Some("   ".to_string()),
            message: "Where is my order?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_stores_normalized_message() {
        let (support, remote) = service();
        let user = UserId::new("u1");

        let id = support.submit(form(), Some(&user)).await.unwrap();

        let messages = remote.messages();
        assert_eq!(messages.len(), 1);
        let (stored_id, message) = &messages[0];
        assert_eq!(stored_id, &id);
        assert_eq!(message.name, "Ana");
        assert_eq!(message.email.as_str(), "ana@example.com");
        assert_eq!(message.subject, None);
        assert_eq!(message.user_id, Some(user));
        assert_eq!(message.created_at.timestamp_millis(), 1_700_000_000_000);
        assert!(!message.read);
    }

    #[test]
    fn test_validation_rules() {
        let (support, _) = service();

        let missing_name = ContactForm {
            name: " ".into(),
            ..form()
        };
        assert!(matches!(support.validate(missing_name, None), Err(FormError::MissingName)));

        let missing_message = ContactForm {
            message: String::new(),
            ..form()
        };
        assert!(matches!(
            support.validate(missing_message, None),
            Err(FormError::MissingMessage)
        ));

        let bad_email = ContactForm {
            email: "not-an-email".into(),
            ..form()
        };
        assert!(matches!(support.validate(bad_email, None), Err(FormError::InvalidEmail(_))));
    }

    #[test]
    fn test_message_length_counts_characters() {
        let (support, _) = service();
        let at_limit = ContactForm {
            message: "ñ".repeat(MAX_MESSAGE_CHARS),
            ..form()
        };
        assert!(support.validate(at_limit, None).is_ok());

        let over = ContactForm {
            message: "a".repeat(MAX_MESSAGE_CHARS + 1),
            ..form()
        };
        let err = support.validate(over, None).unwrap_err();
        assert!(matches!(err, FormError::MessageTooLong { actual: 2001, .. }));
        assert!(err.user_message(Locale::En).contains("2000"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_reportable() {
        let (support, remote) = service();
        remote.set_offline(true);

        let err = support.submit(form(), None).await.unwrap_err();
        assert!(err.is_reportable());
        assert_eq!(
            err.user_message(Locale::Es),
            "No pudimos enviar tu mensaje. Inténtalo de nuevo más tarde."
        );
        assert!(remote.messages().is_empty());
    }

    #[test]
    fn test_created_at_uses_clock() {
        let (support, _) = service();
        let message = support.validate(form(), None).unwrap();
        assert!(message.created_at < Utc::now());
    }
}
