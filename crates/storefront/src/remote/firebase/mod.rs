//! Firebase Realtime Database client.
//!
//! Uses the REST API for document reads and writes and the
//! `text/event-stream` API for collection subscriptions. Profiles are cached
//! using `moka` (5-minute TTL).

mod conversions;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{
    CartItem, Category, ContactMessage, MessageId, Product, RemoteCart, Subcategory, UserId,
    UserProfile,
};
use chrono::Utc;
use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::DatabaseConfig;
use crate::remote::{
    Collection, Listener, ProductQuery, RemoteDataSource, RemoteError, Subscription,
};

use conversions::decode_collection;
use stream::EventStreamParser;

const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Client for a Firebase Realtime Database.
///
/// Cheap to clone; clones share the HTTP connection pool and profile cache.
#[derive(Clone)]
pub struct FirebaseClient {
    inner: Arc<FirebaseClientInner>,
}

struct FirebaseClientInner {
    client: reqwest::Client,
    base: Url,
    auth: Option<String>,
    profiles: Cache<UserId, UserProfile>,
}

/// Payload of `put`/`patch` stream events.
#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Response to a POST: the generated child key.
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

impl FirebaseClient {
    /// Create a new client for the configured database.
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        let profiles = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(FirebaseClientInner {
                client: reqwest::Client::new(),
                base: config.url.clone(),
                auth: config.secret().map(str::to_owned),
                profiles,
            }),
        }
    }

    /// REST URL of the document at `segments`, with auth attached.
    fn document_url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let path = segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut url = self.inner.base.join(&format!("{path}.json"))?;
        if let Some(auth) = &self.inner.auth {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        Ok(url)
    }

    /// URL of a catalog collection, ordered by key and limited when asked.
    fn collection_url(&self, collection: Collection, limit: Option<usize>) -> Result<Url, RemoteError> {
        let mut url = self.document_url(&[collection.path()])?;
        if let Some(limit) = limit {
            url.query_pairs_mut()
                .append_pair("orderBy", "\"$key\"")
                .append_pair("limitToFirst", &limit.to_string());
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, RemoteError> {
        let response = self.inner.client.get(url).send().await?;
        let body = check_status(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_document<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>, RemoteError> {
        let value = self.get_json(self.document_url(segments)?).await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn put_document<T: serde::Serialize + Sync>(
        &self,
        segments: &[&str],
        document: &T,
    ) -> Result<(), RemoteError> {
        let url = self.document_url(segments)?;
        let response = self.inner.client.put(url).json(document).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Spawn a streaming subscription to `collection`.
    ///
    /// Without a Tokio runtime there is nothing to drive the stream, so the
    /// listener is told the remote is unavailable instead.
    fn subscribe<T>(&self, collection: Collection, limit: Option<usize>, listener: Listener<T>) -> Subscription
    where
        T: DeserializeOwned + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            listener(Err(RemoteError::Unavailable(
                "no async runtime to drive the subscription".to_string(),
            )));
            return Subscription::noop();
        };

        let client = self.clone();
        let handle = runtime.spawn(async move {
            client.follow_collection(collection, limit, listener).await;
        });
        Subscription::new(move || handle.abort())
    }

    /// Keep a collection stream open, reconnecting with backoff until the
    /// server closes it for good or the task is aborted.
    async fn follow_collection<T: DeserializeOwned>(
        self,
        collection: Collection,
        limit: Option<usize>,
        listener: Listener<T>,
    ) {
        let mut backoff = RECONNECT_MIN;
        loop {
            match self.stream_collection(collection, limit, &listener).await {
                Ok(()) => {
                    debug!(%collection, "event stream ended, reconnecting");
                    backoff = RECONNECT_MIN;
                }
                Err(e @ RemoteError::SubscriptionClosed(_)) => {
                    warn!(%collection, error = %e, "subscription closed");
                    listener(Err(e));
                    return;
                }
                Err(e) => {
                    warn!(%collection, error = %e, retry_in = ?backoff, "event stream failed");
                    listener(Err(e));
                }
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(RECONNECT_MAX);
        }
    }

    async fn stream_collection<T: DeserializeOwned>(
        &self,
        collection: Collection,
        limit: Option<usize>,
        listener: &Listener<T>,
    ) -> Result<(), RemoteError> {
        let url = self.collection_url(collection, limit)?;
        let response = self
            .inner
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let mut response = check_status(response).await?;
        let mut parser = EventStreamParser::default();

        while let Some(chunk) = response.chunk().await? {
            for event in parser.push(&chunk) {
                match event.kind.as_str() {
                    "put" | "patch" => {
                        let payload: StreamPayload = serde_json::from_str(&event.data)?;
                        // Only a root put carries the whole collection.
                        let snapshot = if event.kind == "put" && payload.path == "/" {
                            payload.data
                        } else {
                            self.get_json(url.clone()).await?
                        };
                        let mut items: Vec<T> = decode_collection(collection, snapshot);
                        if let Some(limit) = limit {
                            items.truncate(limit);
                        }
                        debug!(%collection, count = items.len(), "collection updated");
                        listener(Ok(items));
                    }
                    "keep-alive" => {}
                    "cancel" | "auth_revoked" => {
                        return Err(RemoteError::SubscriptionClosed(event.kind));
                    }
                    other => debug!(%collection, event = other, "ignoring stream event"),
                }
            }
        }

        Ok(())
    }
}

/// Map non-success statuses to typed errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or(body);

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(RemoteError::PermissionDenied(message));
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(RemoteError::Unavailable(message));
    }
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

impl RemoteDataSource for FirebaseClient {
    fn subscribe_to_products(&self, query: ProductQuery, listener: Listener<Product>) -> Subscription {
        self.subscribe(Collection::Products, query.limit, listener)
    }

    fn subscribe_to_categories(&self, listener: Listener<Category>) -> Subscription {
        self.subscribe(Collection::Categories, None, listener)
    }

    fn subscribe_to_subcategories(&self, listener: Listener<Subcategory>) -> Subscription {
        self.subscribe(Collection::Subcategories, None, listener)
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn read_cart(&self, user: &UserId) -> Result<Option<RemoteCart>, RemoteError> {
        self.get_document(&["carts", user.as_str()]).await
    }

    #[instrument(skip(self, items), fields(user = %user, lines = items.len()))]
    async fn write_cart(&self, user: &UserId, items: &[CartItem]) -> Result<(), RemoteError> {
        let document = RemoteCart {
            items: items.to_vec(),
            updated_at: Utc::now(),
        };
        self.put_document(&["carts", user.as_str()], &document).await
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn read_user_profile(&self, user: &UserId) -> Result<Option<UserProfile>, RemoteError> {
        if let Some(profile) = self.inner.profiles.get(user).await {
            debug!("profile cache hit");
            return Ok(Some(profile));
        }

        let profile: Option<UserProfile> = self.get_document(&["users", user.as_str()]).await?;
        if let Some(profile) = &profile {
            self.inner.profiles.insert(user.clone(), profile.clone()).await;
        }
        Ok(profile)
    }

    #[instrument(skip(self, profile), fields(user = %user))]
    async fn write_user_profile(&self, user: &UserId, profile: &UserProfile) -> Result<(), RemoteError> {
        self.put_document(&["users", user.as_str()], profile).await?;
        self.inner.profiles.insert(user.clone(), profile.clone()).await;
        Ok(())
    }

    #[instrument(skip(self, message), fields(kind = ?message.kind))]
    async fn append_message(&self, message: &ContactMessage) -> Result<MessageId, RemoteError> {
        let url = self.document_url(&["messages"])?;
        let response = self.inner.client.post(url).json(message).send().await?;
        let body = check_status(response).await?.text().await?;
        let pushed: PushResponse = serde_json::from_str(&body)?;
        Ok(MessageId::new(pushed.name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use secrecy::SecretString;

    use super::*;

    fn client(secret: Option<&str>) -> FirebaseClient {
        let mut config = DatabaseConfig::unauthenticated("https://shop-default-rtdb.firebaseio.com").unwrap();
        config.secret = secret.map(SecretString::from);
        FirebaseClient::new(&config)
    }

    #[test]
    fn test_document_url_encodes_segments_and_auth() {
        let url = client(Some("tok3n")).document_url(&["carts", "uid/with space"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://shop-default-rtdb.firebaseio.com/carts/uid%2Fwith%20space.json?auth=tok3n"
        );
    }

    #[test]
    fn test_collection_url_with_limit() {
        let url = client(None).collection_url(Collection::Products, Some(50)).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/products.json");
        assert_eq!(
            pairs,
            vec![
                ("orderBy".to_string(), "\"$key\"".to_string()),
                ("limitToFirst".to_string(), "50".to_string()),
            ]
        );

        let plain = client(None).collection_url(Collection::Categories, None).unwrap();
        assert_eq!(plain.query(), None);
    }

    #[test]
    fn test_subscribe_without_runtime_reports_unavailable() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Listener<Category> = Arc::new(move |result| {
            sink.lock().unwrap().push(result.is_err());
        });

        let subscription = client(None).subscribe_to_categories(listener);
        assert!(!subscription.is_active());
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }
}
