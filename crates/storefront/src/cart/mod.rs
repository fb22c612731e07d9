//! The shopping cart.
//!
//! The in-memory cart is authoritative. Every mutation is persisted to
//! local storage and, when a user is signed in, mirrored to the remote
//! database through the [`BestEffort`] side channel. Remote failures never
//! reach callers.

mod merge;

pub use merge::{MergeOutcome, merge_lines};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bazaar_core::{CartItem, NewCartItem, Price, ProductId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::remote::RemoteDataSource;
use crate::storage::{LocalStorage, keys};
use crate::sync::BestEffort;

/// The cart as persisted locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartState {
    #[serde(default)]
    items: Vec<CartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
}

/// Optimistic cart store.
pub struct CartStore<R> {
    remote: Arc<R>,
    storage: Arc<dyn LocalStorage>,
    state: Mutex<CartState>,
    sync: BestEffort,
}

impl<R: RemoteDataSource> CartStore<R> {
    /// Open the cart, restoring whatever was persisted.
    ///
    /// A missing or corrupt persisted cart loads as empty.
    #[must_use]
    pub fn new(remote: Arc<R>, storage: Arc<dyn LocalStorage>) -> Self {
        let state = load(storage.as_ref());
        debug!(lines = state.items.len(), "cart restored");
        Self {
            remote,
            storage,
            state: Mutex::new(state),
            sync: BestEffort::new(),
        }
    }

    /// Add one unit of `item`, creating its line if needed.
    pub fn add_to_cart(&self, item: NewCartItem) {
        add_breadcrumb("cart", "Added item", Some(&[("product_id", item.id.as_str())]));
        self.mutate(|items| {
            match items
                .iter_mut()
                .find(|line| line.is_line(&item.id, item.variant_key.as_deref()))
            {
                Some(line) => line.quantity = line.quantity.saturating_add(1),
                None => items.push(item.into_line()),
            }
            true
        });
    }

    /// Remove the line for `(id, variant_key)`, or every line of `id` when
    /// no variant is given.
    pub fn remove_from_cart(&self, id: &ProductId, variant_key: Option<&str>) {
        add_breadcrumb("cart", "Removed item", Some(&[("product_id", id.as_str())]));
        self.mutate(|items| {
            let before = items.len();
            items.retain(|line| !line.matches(id, variant_key));
            items.len() != before
        });
    }

    /// Set the quantity of the matching line(s). Zero removes them.
    pub fn update_quantity(&self, id: &ProductId, quantity: u32, variant_key: Option<&str>) {
        if quantity == 0 {
            self.remove_from_cart(id, variant_key);
            return;
        }
        self.mutate(|items| {
            let mut changed = false;
            for line in items.iter_mut().filter(|line| line.matches(id, variant_key)) {
                line.quantity = quantity;
                changed = true;
            }
            changed
        });
    }

    /// Empty the cart (and the remote mirror, if signed in).
    pub fn clear_cart(&self) {
        add_breadcrumb("cart", "Cleared cart", None);
        self.mutate(|items| {
            items.clear();
            true
        });
    }

    /// Sum of quantities, saturating at `u32::MAX`.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lock()
            .items
            .iter()
            .fold(0, |total, line| total.saturating_add(line.quantity))
    }

    /// Sum of `price * quantity` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.lock().items.iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().items.clone()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.lock().user_id.clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Associate the cart with a signed-in user, or with nobody.
    ///
    /// Signing in runs the login merge and returns its outcome. Signing out
    /// keeps the local lines.
    pub async fn set_user_id(&self, user: Option<UserId>) -> Option<MergeOutcome> {
        {
            let mut state = self.lock();
            state.user_id.clone_from(&user);
            self.persist(&state);
        }

        match user {
            Some(user) => {
                info!(user = %user, "cart associated with user");
                set_sentry_user(&user, None);
                Some(self.sync_from_remote(&user).await)
            }
            None => {
                info!("cart disassociated from user");
                clear_sentry_user();
                None
            }
        }
    }

    /// Merge the local cart with `user`'s remote mirror.
    ///
    /// Remote lines win on conflict; local-only lines are kept. Both sides
    /// end up holding the merged list.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn sync_from_remote(&self, user: &UserId) -> MergeOutcome {
        let remote = match self.remote.read_cart(user).await {
            Ok(remote) => remote.map(|cart| merge::normalize(cart.items)).unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "could not fetch remote cart, keeping local cart");
                return MergeOutcome::FetchFailed;
            }
        };

        let mut state = self.lock();
        let outcome = match (remote.is_empty(), state.items.is_empty()) {
            (false, false) => {
                let (merged, local_only) = merge_lines(&state.items, &remote);
                state.items = merged;
                self.persist(&state);
                self.queue_remote_write(user.clone(), state.items.clone());
                MergeOutcome::Merged {
                    remote_lines: remote.len(),
                    local_only,
                }
            }
            (false, true) => {
                let lines = remote.len();
                state.items = remote;
                self.persist(&state);
                MergeOutcome::AdoptedRemote { lines }
            }
            (true, false) => {
                self.queue_remote_write(user.clone(), state.items.clone());
                MergeOutcome::PushedLocal {
                    lines: state.items.len(),
                }
            }
            (true, true) => MergeOutcome::NothingToSync,
        };
        drop(state);

        info!(?outcome, "cart merged with remote");
        outcome
    }

    /// Wait for every queued remote write to finish.
    pub async fn flush_remote(&self) {
        self.sync.flush().await;
    }

    /// The side channel carrying remote writes.
    #[must_use]
    pub const fn side_channel(&self) -> &BestEffort {
        &self.sync
    }

    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Persisting and queueing under the lock keeps both in mutation order;
    // neither blocks on the network.
    fn mutate(&self, change: impl FnOnce(&mut Vec<CartItem>) -> bool) {
        let mut state = self.lock();
        if !change(&mut state.items) {
            return;
        }
        self.persist(&state);
        if let Some(user) = state.user_id.clone() {
            self.queue_remote_write(user, state.items.clone());
        }
    }

    fn persist(&self, state: &CartState) {
        let result = serde_json::to_string(state)
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                self.storage
                    .set(keys::CART, &payload)
                    .map_err(|e| e.to_string())
            });
        if let Err(error) = result {
            warn!(%error, "failed to persist cart");
        }
    }

    fn queue_remote_write(&self, user: UserId, items: Vec<CartItem>) {
        let remote = Arc::clone(&self.remote);
        self.sync.submit("cart.write", async move {
            remote.write_cart(&user, &items).await
        });
    }
}

fn load(storage: &dyn LocalStorage) -> CartState {
    match storage.get(keys::CART) {
        Ok(Some(raw)) => match serde_json::from_str::<CartState>(&raw) {
            Ok(mut state) => {
                state.items = merge::normalize(state.items);
                state
            }
            Err(e) => {
                warn!(error = %e, "persisted cart is corrupt, starting empty");
                CartState::default()
            }
        },
        Ok(None) => CartState::default(),
        Err(e) => {
            warn!(error = %e, "could not read persisted cart, starting empty");
            CartState::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryStorage;

    fn new_item(id: &str, cents: i64, variant: Option<&str>) -> NewCartItem {
        NewCartItem {
            id: ProductId::new(id),
            name: id.to_uppercase(),
            price: Price::from_cents(cents),
            image: "📦".to_string(),
            variant_key: variant.map(str::to_owned),
        }
    }

    fn line(id: &str, quantity: u32) -> CartItem {
        CartItem {
            quantity,
            ..new_item(id, 1000, None).into_line()
        }
    }

    fn store() -> (CartStore<MemoryRemote>, Arc<MemoryRemote>, Arc<MemoryStorage>) {
        let remote = Arc::new(MemoryRemote::new());
        let storage = Arc::new(MemoryStorage::new());
        let cart = CartStore::new(Arc::clone(&remote), storage.clone());
        (cart, remote, storage)
    }

    #[test]
    fn test_add_at_max_quantity_saturates() {
        let (cart, _, _) = store();
        cart.add_to_cart(new_item("a", 100, None));
        cart.update_quantity(&ProductId::new("a"), u32::MAX, None);

        cart.add_to_cart(new_item("a", 100, None));
        assert_eq!(cart.items()[0].quantity, u32::MAX);
    }

    #[test]
    fn test_total_items_saturates() {
        let (cart, _, _) = store();
        cart.add_to_cart(new_item("a", 100, None));
        cart.add_to_cart(new_item("b", 100, None));
        cart.update_quantity(&ProductId::new("a"), u32::MAX, None);

        assert_eq!(cart.total_items(), u32::MAX);
    }

    #[test]
    fn test_repeated_adds_accumulate_on_one_line() {
        let (cart, _, _) = store();
        for _ in 0..4 {
            cart.add_to_cart(new_item("a", 250, Some("red")));
        }
        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 4);
    }

    #[test]
    fn test_variants_are_separate_lines() {
        let (cart, _, _) = store();
        cart.add_to_cart(new_item("a", 250, Some("red")));
        cart.add_to_cart(new_item("a", 250, Some("blue")));
        cart.add_to_cart(new_item("a", 250, None));
        assert_eq!(cart.items().len(), 3);
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_remove_then_add_starts_fresh() {
        let (cart, _, _) = store();
        cart.add_to_cart(new_item("a", 250, Some("red")));
        cart.add_to_cart(new_item("a", 250, Some("red")));
        cart.remove_from_cart(&ProductId::new("a"), Some("red"));
        assert!(cart.is_empty());

        cart.add_to_cart(new_item("a", 250, Some("red")));
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_remove_without_variant_removes_every_variant() {
        let (cart, _, _) = store();
        cart.add_to_cart(new_item("a", 250, Some("red")));
        cart.add_to_cart(new_item("a", 250, Some("blue")));
        cart.add_to_cart(new_item("b", 250, None));

        cart.remove_from_cart(&ProductId::new("a"), None);
        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "b");
    }

    #[test]
    fn test_update_quantity_and_zero_removes() {
        let (cart, _, _) = store();
        cart.add_to_cart(new_item("a", 250, None));
        cart.update_quantity(&ProductId::new("a"), 7, None);
        assert_eq!(cart.total_items(), 7);

        cart.update_quantity(&ProductId::new("missing"), 3, None);
        assert_eq!(cart.items().len(), 1);

        cart.update_quantity(&ProductId::new("a"), 0, None);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals_follow_lines() {
        let (cart, _, _) = store();
        cart.add_to_cart(new_item("a", 1999, None));
        cart.add_to_cart(new_item("a", 1999, None));
        cart.add_to_cart(new_item("b", 550, Some("xl")));
        cart.update_quantity(&ProductId::new("b"), 3, Some("xl"));

        let expected: Price = cart.items().iter().map(CartItem::line_total).sum();
        assert_eq!(cart.total_price(), expected);
        assert_eq!(cart.total_price(), Price::from_cents(1999 * 2 + 550 * 3));
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn test_cart_survives_reopen() {
        let (cart, remote, storage) = store();
        cart.add_to_cart(new_item("a", 250, None));
        cart.add_to_cart(new_item("b", 250, None));
        drop(cart);

        let reopened = CartStore::new(remote, storage);
        assert_eq!(reopened.items().len(), 2);
    }

    #[test]
    fn test_corrupt_persisted_cart_loads_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(keys::CART, "[[[").unwrap();
        let cart = CartStore::new(Arc::new(MemoryRemote::new()), storage);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_mutations_without_user_never_touch_remote() {
        let (cart, remote, _) = store();
        cart.add_to_cart(new_item("a", 250, None));
        cart.clear_cart();
        assert_eq!(remote.cart_writes(), 0);
        assert_eq!(cart.side_channel().failed(), 0);
    }

    #[tokio::test]
    async fn test_merge_unions_local_and_remote() {
        let (cart, remote, _) = store();
        let user = UserId::new("u1");
        remote.seed_cart(&user, vec![line("b", 1)]);
        cart.add_to_cart(new_item("a", 1000, None));
        cart.update_quantity(&ProductId::new("a"), 2, None);

        let outcome = cart.set_user_id(Some(user.clone())).await;
        cart.flush_remote().await;

        assert_eq!(
            outcome,
            Some(MergeOutcome::Merged {
                remote_lines: 1,
                local_only: 1
            })
        );
        let local = cart.items();
        assert_eq!(local, vec![line("b", 1), line("a", 2)]);
        assert_eq!(remote.cart(&user).unwrap().items, local);
    }

    #[tokio::test]
    async fn test_empty_local_adopts_remote() {
        let (cart, remote, _) = store();
        let user = UserId::new("u1");
        remote.seed_cart(&user, vec![line("x", 3)]);

        let outcome = cart.set_user_id(Some(user)).await;
        cart.flush_remote().await;

        assert_eq!(outcome, Some(MergeOutcome::AdoptedRemote { lines: 1 }));
        assert_eq!(cart.items(), vec![line("x", 3)]);
        assert_eq!(remote.cart_writes(), 0);
    }

    #[tokio::test]
    async fn test_local_pushed_when_remote_absent() {
        let (cart, remote, _) = store();
        let user = UserId::new("u1");
        cart.add_to_cart(new_item("a", 1000, None));

        let outcome = cart.set_user_id(Some(user.clone())).await;
        cart.flush_remote().await;

        assert_eq!(outcome, Some(MergeOutcome::PushedLocal { lines: 1 }));
        assert_eq!(remote.cart(&user).unwrap().items, vec![line("a", 1)]);
    }

    #[tokio::test]
    async fn test_nothing_to_sync() {
        let (cart, remote, _) = store();
        let outcome = cart.set_user_id(Some(UserId::new("u1"))).await;
        assert_eq!(outcome, Some(MergeOutcome::NothingToSync));
        assert_eq!(remote.cart_writes(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_local_cart() {
        let (cart, remote, _) = store();
        cart.add_to_cart(new_item("a", 1000, None));
        remote.set_offline(true);

        let outcome = cart.set_user_id(Some(UserId::new("u1"))).await;
        assert_eq!(outcome, Some(MergeOutcome::FetchFailed));
        assert_eq!(cart.items(), vec![line("a", 1)]);
    }

    #[tokio::test]
    async fn test_signed_in_mutations_are_mirrored_in_order() {
        let (cart, remote, _) = store();
        let user = UserId::new("u1");
        cart.set_user_id(Some(user.clone())).await;

        cart.add_to_cart(new_item("a", 1000, None));
        cart.add_to_cart(new_item("b", 1000, None));
        cart.remove_from_cart(&ProductId::new("a"), None);
        cart.flush_remote().await;

        assert_eq!(remote.cart_writes(), 3);
        assert_eq!(remote.cart(&user).unwrap().items, vec![line("b", 1)]);

        cart.clear_cart();
        cart.flush_remote().await;
        assert!(remote.cart(&user).unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_remote_write_failures_are_swallowed() {
        let (cart, remote, _) = store();
        cart.set_user_id(Some(UserId::new("u1"))).await;
        remote.set_offline(true);

        cart.add_to_cart(new_item("a", 1000, None));
        cart.flush_remote().await;

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.side_channel().failed(), 1);
    }

    #[tokio::test]
    async fn test_logout_keeps_local_cart() {
        let (cart, _, storage) = store();
        cart.set_user_id(Some(UserId::new("u1"))).await;
        cart.add_to_cart(new_item("a", 1000, None));

        assert_eq!(cart.set_user_id(None).await, None);
        assert_eq!(cart.user_id(), None);
        assert_eq!(cart.items().len(), 1);

        let persisted = storage.get(keys::CART).unwrap().unwrap();
        assert!(!persisted.contains("userId"));
    }
}
