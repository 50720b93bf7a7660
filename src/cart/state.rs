//! Shopping Cart State Management
//!
//! This module manages the application state shared by every request:
//! per-session carts, the storage they persist to, the current checkout
//! settings and the client for the remote storefront backend.
//!
//! Live carts are a cache over storage. A request without a session cookie
//! never allocates one, and carts nobody has touched for a while are evicted
//! and rehydrated on their next use.

use super::{
    models::{CartLineItem, CartView},
    storage::{CartPersistence, KeyValueStorage},
    store::CartStore,
};
use crate::checkout::{gateway::StorefrontClient, settings::CheckoutSettings};
use dashmap::{mapref::one::RefMut, DashMap, DashSet};
use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state that can be safely passed between threads
pub type SharedState = Arc<AppState>;

/// A live cart and the last time a request used it.
#[derive(Debug)]
pub struct SessionCart {
    store: CartStore,
    last_access: Instant,
}

impl SessionCart {
    fn new(store: CartStore) -> Self {
        Self {
            store,
            last_access: Instant::now(),
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_access.elapsed()
    }
}

impl Deref for SessionCart {
    type Target = CartStore;

    fn deref(&self) -> &CartStore {
        &self.store
    }
}

impl DerefMut for SessionCart {
    fn deref_mut(&mut self) -> &mut CartStore {
        &mut self.store
    }
}

/// Marks a session's checkout as in flight until dropped.
pub struct CheckoutGuard<'a> {
    in_flight: &'a DashSet<String>,
    session_id: String,
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.session_id);
    }
}

/// Core application state containing carts and checkout collaborators
pub struct AppState {
    /// Live carts keyed by session id.
    /// The DashMap shard guard serializes mutations of a single cart.
    pub carts: DashMap<String, SessionCart>,

    /// Sessions with a payment submission pending.
    pub checkouts_in_flight: DashSet<String>,

    /// Durable storage carts are hydrated from and saved to.
    pub storage: Arc<dyn KeyValueStorage>,

    /// Latest shipping configuration and payment key.
    pub settings: CheckoutSettings,

    /// Remote storefront backend.
    pub storefront: StorefrontClient,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        settings: CheckoutSettings,
        storefront: StorefrontClient,
    ) -> Self {
        Self {
            carts: DashMap::new(),
            checkouts_in_flight: DashSet::new(),
            storage,
            settings,
            storefront,
        }
    }

    /// Returns the session's cart, hydrating it from storage on first use.
    pub fn cart(&self, session_id: &str) -> RefMut<'_, String, SessionCart> {
        if let Some(mut cart) = self.carts.get_mut(session_id) {
            cart.last_access = Instant::now();
            return cart;
        }

        // Storage is read before the shard lock is taken; a concurrent
        // hydration of the same session keeps whichever lands first.
        tracing::debug!(session_id, "opening cart");
        let store = CartStore::open(CartPersistence::for_session(
            Arc::clone(&self.storage),
            session_id,
        ));
        self.carts
            .entry(session_id.to_owned())
            .or_insert_with(|| SessionCart::new(store))
    }

    /// Read-only view. A session minted for this request has nothing stored,
    /// so it gets an empty view without allocating a cart.
    pub fn view(&self, session_id: &str, is_new_session: bool) -> CartView {
        if is_new_session {
            return CartView::default();
        }
        self.cart(session_id).view()
    }

    /// Owned copy of the session's items, with the same rule as [`Self::view`].
    pub fn snapshot(&self, session_id: &str, is_new_session: bool) -> Vec<CartLineItem> {
        if is_new_session {
            return Vec::new();
        }
        self.cart(session_id).snapshot()
    }

    /// Claims the session for a payment submission. `None` while another
    /// submission for the same session is pending.
    pub fn begin_checkout(&self, session_id: &str) -> Option<CheckoutGuard<'_>> {
        if !self.checkouts_in_flight.insert(session_id.to_owned()) {
            return None;
        }
        Some(CheckoutGuard {
            in_flight: &self.checkouts_in_flight,
            session_id: session_id.to_owned(),
        })
    }

    /// Drops live carts idle for at least `max_idle`. Their items stay in
    /// storage; the open/closed flag resets to closed on rehydration.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.carts.len();
        self.carts.retain(|_, cart| cart.idle_for() < max_idle);
        before.saturating_sub(self.carts.len())
    }
}

/// Periodically evicts carts idle for `max_idle`.
pub fn spawn_eviction(state: SharedState, max_idle: Duration) -> JoinHandle<()> {
    let every = (max_idle / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let evicted = state.evict_idle(max_idle);
            if evicted > 0 {
                tracing::debug!(evicted, live = state.carts.len(), "evicted idle carts");
            }
        }
    })
}
