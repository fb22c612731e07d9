//! Time-bounded catalog snapshot in local storage.

use std::sync::Arc;

use bazaar_core::Catalog;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::storage::{LocalStorage, keys};

/// How long a snapshot stays fresh.
pub const SNAPSHOT_TTL: TimeDelta = TimeDelta::minutes(5);

/// Snapshots serializing to more than this many bytes are not written.
pub const MAX_SNAPSHOT_BYTES: usize = 2 * 1024 * 1024;

/// A catalog captured at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData {
    #[serde(flatten)]
    pub catalog: Catalog,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl CachedData {
    /// Whether the snapshot is still fresh at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < SNAPSHOT_TTL
    }
}

/// What [`SnapshotCache::save_snapshot`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { bytes: usize },
    SkippedTooLarge { bytes: usize },
    Failed,
}

/// Reads and writes the catalog snapshot.
///
/// Never fails outward: storage errors become cache misses or skipped writes.
#[derive(Clone)]
pub struct SnapshotCache {
    storage: Arc<dyn LocalStorage>,
    clock: Arc<dyn Clock>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// The stored snapshot, if present and fresh.
    #[must_use]
    pub fn get_cached_snapshot(&self) -> Option<CachedData> {
        let raw = match self.storage.get(keys::CATALOG_SNAPSHOT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "catalog snapshot read failed");
                return None;
            }
        };

        let cached: CachedData = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "discarding undecodable catalog snapshot");
                return None;
            }
        };

        let now = self.clock.now();
        if !cached.is_fresh_at(now) {
            debug!(
                age_secs = (now - cached.timestamp).num_seconds(),
                "catalog snapshot expired"
            );
            return None;
        }
        Some(cached)
    }

    /// Overwrite the snapshot with `catalog`, stamped with the current time.
    pub fn save_snapshot(&self, catalog: &Catalog) -> SaveOutcome {
        let snapshot = CachedData {
            catalog: catalog.clone(),
            timestamp: self.clock.now(),
        };
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "catalog snapshot serialization failed");
                return SaveOutcome::Failed;
            }
        };

        let bytes = payload.len();
        if bytes > MAX_SNAPSHOT_BYTES {
            warn!(bytes, limit = MAX_SNAPSHOT_BYTES, "catalog snapshot too large, not caching");
            return SaveOutcome::SkippedTooLarge { bytes };
        }

        match self.storage.set(keys::CATALOG_SNAPSHOT, &payload) {
            Ok(()) => {
                debug!(
                    bytes,
                    products = catalog.products.len(),
                    "catalog snapshot saved"
                );
                SaveOutcome::Written { bytes }
            }
            Err(e) => {
                warn!(error = %e, "catalog snapshot write failed");
                SaveOutcome::Failed
            }
        }
    }

    /// Remove the snapshot.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(keys::CATALOG_SNAPSHOT) {
            warn!(error = %e, "catalog snapshot clear failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Price, Product, ProductId};

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;

    fn product(n: usize) -> Product {
        Product {
            id: ProductId::new(format!("p{n}")),
            name: format!("Product {n}"),
            price: Price::from_cents(999),
            original_price: None,
            category: "misc".to_string(),
            image: "📦".to_string(),
            description: String::new(),
            rating: 4.0,
            reviews: 3,
            badge: None,
            is_flash_deal: false,
            show_in_hero: false,
        }
    }

    fn catalog(products: usize) -> Catalog {
        Catalog {
            products: (0..products).map(product).collect(),
            ..Catalog::default()
        }
    }

    fn setup() -> (SnapshotCache, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SnapshotCache::new(storage.clone(), clock.clone());
        (cache, storage, clock)
    }

    #[test]
    fn test_snapshot_fresh_just_under_five_minutes() {
        let (cache, _, clock) = setup();
        assert!(matches!(cache.save_snapshot(&catalog(10)), SaveOutcome::Written { .. }));

        clock.advance(TimeDelta::seconds(4 * 60 + 59));
        let cached = cache.get_cached_snapshot().unwrap();
        assert_eq!(cached.catalog.products.len(), 10);
    }

    #[test]
    fn test_snapshot_expires_after_five_minutes() {
        let (cache, _, clock) = setup();
        cache.save_snapshot(&catalog(10));

        clock.advance(TimeDelta::seconds(5 * 60 + 1));
        assert!(cache.get_cached_snapshot().is_none());
    }

    #[test]
    fn test_oversized_snapshot_is_not_written() {
        let (cache, storage, _) = setup();
        let mut huge = catalog(1);
        huge.products[0].description = "x".repeat(MAX_SNAPSHOT_BYTES + 1);

        let outcome = cache.save_snapshot(&huge);
        assert!(matches!(outcome, SaveOutcome::SkippedTooLarge { bytes } if bytes > MAX_SNAPSHOT_BYTES));
        assert!(storage.get(keys::CATALOG_SNAPSHOT).unwrap().is_none());
    }

    #[test]
    fn test_oversized_snapshot_keeps_previous() {
        let (cache, _, _) = setup();
        cache.save_snapshot(&catalog(2));

        let mut huge = catalog(1);
        huge.products[0].description = "x".repeat(MAX_SNAPSHOT_BYTES);
        cache.save_snapshot(&huge);

        assert_eq!(cache.get_cached_snapshot().unwrap().catalog.products.len(), 2);
    }

    #[test]
    fn test_write_failures_are_swallowed() {
        let storage = Arc::new(MemoryStorage::with_quota(64));
        let cache = SnapshotCache::new(storage, Arc::new(ManualClock::new(Utc::now())));
        assert_eq!(cache.save_snapshot(&catalog(5)), SaveOutcome::Failed);
        assert!(cache.get_cached_snapshot().is_none());

        let disabled = SnapshotCache::new(
            Arc::new(MemoryStorage::disabled()),
            Arc::new(ManualClock::new(Utc::now())),
        );
        assert_eq!(disabled.save_snapshot(&catalog(1)), SaveOutcome::Failed);
        assert!(disabled.get_cached_snapshot().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_a_miss() {
        let (cache, storage, _) = setup();
        storage.set(keys::CATALOG_SNAPSHOT, "{not json").unwrap();
        assert!(cache.get_cached_snapshot().is_none());
    }

    #[test]
    fn test_wire_shape() {
        let (cache, storage, clock) = setup();
        clock.set(DateTime::from_timestamp_millis(1_700_000_000_000).unwrap());
        cache.save_snapshot(&catalog(1));

        let raw: serde_json::Value =
            serde_json::from_str(&storage.get(keys::CATALOG_SNAPSHOT).unwrap().unwrap()).unwrap();
        assert_eq!(raw["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(raw["products"][0]["id"], "p0");
        assert!(raw["categories"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let (cache, _, _) = setup();
        cache.save_snapshot(&catalog(3));
        cache.clear();
        assert!(cache.get_cached_snapshot().is_none());
    }
}
