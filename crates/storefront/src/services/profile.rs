//! User profile documents.

use std::sync::Arc;

use bazaar_core::{Email, UserId, UserProfile};
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::remote::{RemoteDataSource, RemoteError};

/// Loads and saves user profiles.
pub struct ProfileService<R> {
    remote: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: RemoteDataSource> ProfileService<R> {
    #[must_use]
    pub fn new(remote: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { remote, clock }
    }

    /// Read `uid`'s profile, creating a default one on first sign-in.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the profile cannot be read or written.
    #[instrument(skip(self, email, display_name), fields(user = %uid))]
    pub async fn load_or_create(
        &self,
        uid: &UserId,
        email: Option<Email>,
        display_name: Option<String>,
    ) -> Result<UserProfile, RemoteError> {
        if let Some(profile) = self.remote.read_user_profile(uid).await? {
            return Ok(profile);
        }

        let profile = UserProfile::new(uid.clone(), email, display_name, self.clock.now());
        self.remote.write_user_profile(uid, &profile).await?;
        info!("created user profile");
        Ok(profile)
    }

    /// Save `profile` under its uid.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the write fails.
    #[instrument(skip(self, profile), fields(user = %profile.uid))]
    pub async fn update(&self, profile: &UserProfile) -> Result<(), RemoteError> {
        self.remote.write_user_profile(&profile.uid, profile).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::ShippingAddress;
    use chrono::Utc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::remote::MemoryRemote;

    fn service() -> (ProfileService<MemoryRemote>, Arc<MemoryRemote>) {
        let remote = Arc::new(MemoryRemote::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (ProfileService::new(Arc::clone(&remote), clock), remote)
    }

    #[tokio::test]
    async fn test_first_load_creates_profile() {
        let (profiles, remote) = service();
        let uid = UserId::new("u1");
        let email = Email::parse("ana@example.com").unwrap();

        let profile = profiles.load_or_create(&uid, Some(email), None).await.unwrap();
        assert_eq!(profile.display_name, "ana");
        assert_eq!(remote.profile(&uid), Some(profile));
    }

    #[tokio::test]
    async fn test_existing_profile_is_returned_unchanged() {
        let (profiles, _) = service();
        let uid = UserId::new("u1");
        let mut profile = profiles
            .load_or_create(&uid, None, Some("Ana".into()))
            .await
            .unwrap();

        profile.phone = Some("+34 600 000 000".into());
        profile.address = Some(ShippingAddress {
            line1: "Calle Mayor 1".into(),
            line2: None,
            city: "Madrid".into(),
            region: String::new(),
            postal_code: "28013".into(),
            country: "ES".into(),
        });
        profiles.update(&profile).await.unwrap();

        let loaded = profiles
            .load_or_create(&uid, None, Some("Someone Else".into()))
            .await
            .unwrap();
        assert_eq!(loaded, profile);
    }

    #[tokio::test]
    async fn test_remote_errors_propagate() {
        let (profiles, remote) = service();
        remote.set_offline(true);
        let result = profiles.load_or_create(&UserId::new("u1"), None, None).await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
    }
}
