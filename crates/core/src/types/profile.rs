//! User profile documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// Default delivery address saved on a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    pub country: String,
}

/// A storefront user's profile, keyed by their auth uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: UserId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<ShippingAddress>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// A fresh profile for a user signing in for the first time.
    #[must_use]
    pub fn new(
        uid: UserId,
        email: Option<Email>,
        display_name: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| email.as_ref().map(|e| e.as_str().split('@').next().unwrap_or("").to_owned()))
            .unwrap_or_default();

        Self {
            uid,
            display_name,
            email,
            phone: None,
            address: None,
            created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_mailbox() {
        let email = Email::parse("jane@example.com").unwrap();
        let profile = UserProfile::new(UserId::new("u1"), Some(email), None, Utc::now());
        assert_eq!(profile.display_name, "jane");

        let named = UserProfile::new(UserId::new("u1"), None, Some("Jane D".into()), Utc::now());
        assert_eq!(named.display_name, "Jane D");

        let blank = UserProfile::new(UserId::new("u1"), None, Some("  ".into()), Utc::now());
        assert_eq!(blank.display_name, "");
    }
}
