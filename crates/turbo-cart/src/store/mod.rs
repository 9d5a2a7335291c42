//! The cart store: the single owner of cart state.
//!
//! Guest carts are mutated synchronously and persisted to local storage.
//! Authenticated carts are mutated optimistically: the change is visible
//! immediately, the remote write follows, and a failure restores the state
//! from before the change. Allocation of promotional credit is recomputed
//! inside the same critical section as every change, so totals are never
//! observed half-updated.
//!
//! Concurrency:
//! - line mutations hold the gate shared; `clear_cart` and `set_user` hold
//!   it exclusively, so whole-cart operations never interleave with them;
//! - remote writes for one key go out one at a time, in the order the
//!   mutations were applied locally (see the `order` module);
//! - state lives behind a synchronous mutex that is never held across an
//!   `.await`.

mod guest;
mod order;
mod snapshot;
mod state;
mod sync;

pub use guest::{GuestCartRecord, GuestCartStorage};
pub use snapshot::{CartSnapshot, LineView};

use crate::cart::{Cart, CartLine, LineDisplay, LineKey, PriceSnapshot};
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::credit::{allocate, PromotionalCredit};
use crate::error::{CartError, RemoteError};
use crate::ids::{ProductId, SizeId, UserId, VariantId};
use crate::migration::{MigrationEngine, MigrationReport};
use crate::money::{Currency, Money};
use crate::remote::{CreditSource, RemoteCart, RemoteLineAck};
use state::CartState;
use std::cmp::Ordering;
use order::SendOrder;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync::Settlement;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use turbo_cache::LocalStore;

/// External collaborators a store needs.
#[derive(Clone)]
pub struct CartServices {
    pub catalog: Arc<dyn Catalog>,
    pub remote: Arc<dyn RemoteCart>,
    pub credits: Arc<dyn CreditSource>,
    pub local: Arc<dyn LocalStore>,
    pub clock: Arc<dyn Clock>,
}

impl CartServices {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        remote: Arc<dyn RemoteCart>,
        credits: Arc<dyn CreditSource>,
        local: Arc<dyn LocalStore>,
    ) -> Self {
        Self {
            catalog,
            remote,
            credits,
            local,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock, e.g. with a [`FixedClock`](crate::clock::FixedClock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// An "add to cart" request.
#[derive(Debug, Clone)]
pub struct AddLineRequest {
    pub key: LineKey,
    pub quantity: u32,
    pub price: PriceSnapshot,
    pub display: LineDisplay,
}

impl AddLineRequest {
    pub fn new(
        product_id: impl Into<ProductId>,
        variant_id: Option<VariantId>,
        size_id: Option<SizeId>,
        quantity: u32,
        price: PriceSnapshot,
    ) -> Self {
        Self {
            key: LineKey::new(product_id, variant_id, size_id),
            quantity,
            price,
            display: LineDisplay::default(),
        }
    }

    pub fn with_display(mut self, display: LineDisplay) -> Self {
        self.display = display;
        self
    }
}

#[derive(Debug)]
enum LineChange {
    Add {
        quantity: u32,
        price: PriceSnapshot,
        display: LineDisplay,
    },
    Adjust(i64),
    Set(u32),
    Remove,
}

/// An optimistic change waiting for the server.
#[derive(Debug)]
struct PendingMutation {
    version: u64,
    key: LineKey,
    /// What the line should become; `None` removes it.
    target: Option<CartLine>,
    /// The whole cart before the change.
    before: Cart,
    /// Cart generation right after the change was applied.
    generation: u64,
}

/// Owns the cart for one shopper session.
pub struct CartStore {
    config: StoreConfig,
    services: CartServices,
    guest: GuestCartStorage,
    state: Mutex<CartState>,
    gate: RwLock<()>,
    send_order: SendOrder,
}

impl CartStore {
    /// Create a store in guest mode, loading any persisted guest cart.
    ///
    /// An unreadable guest cart is logged and replaced by an empty one.
    pub fn new(config: StoreConfig, services: CartServices) -> Self {
        let guest = GuestCartStorage::new(
            Arc::clone(&services.local),
            config.guest_namespace.clone(),
        )
        .with_max_quantity(config.max_quantity_per_line);
        let cart = load_guest_cart(&guest, config.currency);
        let state = CartState::guest(cart, config.apply_credit_by_default);

        Self {
            config,
            services,
            guest,
            state: Mutex::new(state),
            gate: RwLock::new(()),
            send_order: SendOrder::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Line mutations
    // ------------------------------------------------------------------

    /// Add `quantity` units of a line, merging into an existing line with
    /// the same key. The newer price snapshot wins.
    #[instrument(skip(self, request), fields(key = %request.key, quantity = request.quantity))]
    pub async fn add_line(&self, request: AddLineRequest) -> Result<(), CartError> {
        let AddLineRequest {
            key,
            quantity,
            price,
            display,
        } = request;
        self.mutate(
            key,
            LineChange::Add {
                quantity,
                price,
                display,
            },
        )
        .await
    }

    /// Change a line's quantity by `delta`. A result of zero or less
    /// removes the line.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn update_quantity(&self, key: &LineKey, delta: i64) -> Result<(), CartError> {
        if delta == 0 {
            let present = self.lock_state().cart.contains(key);
            return if present {
                Ok(())
            } else {
                Err(self.fail(CartError::LineNotFound(key.to_string())))
            };
        }
        self.mutate(key.clone(), LineChange::Adjust(delta)).await
    }

    /// Set a line's quantity outright. Zero removes the line.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn set_quantity(&self, key: &LineKey, quantity: u32) -> Result<(), CartError> {
        self.mutate(key.clone(), LineChange::Set(quantity)).await
    }

    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn remove_line(&self, key: &LineKey) -> Result<(), CartError> {
        self.mutate(key.clone(), LineChange::Remove).await
    }

    /// Empty the cart.
    ///
    /// Authenticated carts are cleared remotely first and only wiped
    /// locally once the server agrees; a failure leaves the cart untouched.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), CartError> {
        let _gate = self.gate.write().await;
        let user = self.lock_state().session.user().cloned();

        match user {
            None => {
                let mut state = self.lock_state();
                if let Err(e) = self.guest.clear() {
                    warn!(error = %e, "Failed to clear guest cart storage");
                    return Err(record(&mut state, e));
                }
                state.cart.clear();
                state.touch();
                info!("Guest cart cleared");
                Ok(())
            }
            Some(user) => {
                if let Err(e) = self.services.remote.clear_all().await {
                    warn!(user = %user, error = %e, "Remote cart clear failed, cart kept");
                    let mut state = self.lock_state();
                    return Err(record(&mut state, e.into()));
                }
                let mut state = self.lock_state();
                state.cart.clear();
                state.sync.clear();
                state.touch();
                info!(user = %user, "Cart cleared");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Report the authenticated user, or `None` after sign-out.
    ///
    /// Guest to user merges the guest cart into the remote cart and returns
    /// the report. If the remote cart cannot be listed the store stays in
    /// guest mode with its cart intact, and a later call retries.
    #[instrument(skip(self))]
    pub async fn set_user(
        &self,
        user: Option<UserId>,
    ) -> Result<Option<MigrationReport>, CartError> {
        let _gate = self.gate.write().await;
        let current = self.lock_state().session.user().cloned();

        match (current, user) {
            (None, None) => Ok(None),
            (Some(current), Some(next)) if current == next => Ok(None),
            (Some(previous), None) => {
                self.sign_out(&previous);
                Ok(None)
            }
            (None, Some(next)) => self.sign_in(next).await.map(Some),
            (Some(previous), Some(next)) => {
                self.sign_out(&previous);
                self.sign_in(next).await.map(Some)
            }
        }
    }

    /// Clear the cart and reload the credit after checkout succeeded.
    #[instrument(skip(self))]
    pub async fn on_order_placed(&self) -> Result<(), CartError> {
        self.clear_cart().await?;
        self.invalidate_credit().await;
        self.refresh_credit().await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Promotional credit
    // ------------------------------------------------------------------

    /// Flip the apply-credit toggle and reallocate.
    pub fn set_apply_credit(&self, apply: bool) {
        let mut state = self.lock_state();
        if state.apply_credit != apply {
            state.apply_credit = apply;
            self.reallocate(&mut state);
            debug!(apply, "Apply-credit toggle changed");
        }
    }

    /// Install a credit obtained elsewhere and reallocate.
    pub fn set_credit(&self, credit: Option<PromotionalCredit>) {
        let mut state = self.lock_state();
        state.credit = credit;
        self.reallocate(&mut state);
    }

    /// Re-read the credit from the credit source, bypassing its cache.
    #[instrument(skip(self))]
    pub async fn refresh_credit(&self) -> Result<Option<PromotionalCredit>, CartError> {
        self.reload_credit(true).await.map_err(|e| self.fail(e))
    }

    /// Drop the cached credit at the source and locally.
    #[instrument(skip(self))]
    pub async fn invalidate_credit(&self) {
        let user = self.lock_state().session.user().cloned();
        if let Some(user) = &user {
            self.services.credits.invalidate_credit(user).await;
        }
        let mut state = self.lock_state();
        state.credit = None;
        self.reallocate(&mut state);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> CartSnapshot {
        let state = self.lock_state();
        CartSnapshot::build(
            state.session.user().cloned(),
            &state.cart,
            state.apply_credit,
            |key| state.is_pending(key),
            state.pending_count(),
        )
    }

    /// Subtotal minus allocated credit when the toggle is on, floored at zero.
    pub fn cart_total(&self) -> Money {
        let state = self.lock_state();
        state.cart.total(state.apply_credit)
    }

    pub fn cart(&self) -> Cart {
        self.lock_state().cart.clone()
    }

    pub fn line(&self, key: &LineKey) -> Option<CartLine> {
        self.lock_state().cart.get(key).cloned()
    }

    pub fn user(&self) -> Option<UserId> {
        self.lock_state().session.user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn credit(&self) -> Option<PromotionalCredit> {
        self.lock_state().credit.clone()
    }

    pub fn apply_credit(&self) -> bool {
        self.lock_state().apply_credit
    }

    /// The most recent failure, kept until taken.
    pub fn last_error(&self) -> Option<CartError> {
        self.lock_state().last_error.clone()
    }

    pub fn take_error(&self) -> Option<CartError> {
        self.lock_state().last_error.take()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn mutate(&self, key: LineKey, change: LineChange) -> Result<(), CartError> {
        let _gate = self.gate.read().await;

        let (pending, mut ticket) = {
            let mut state = self.lock_state();
            let target = match self.plan(&state, &key, change) {
                Ok(target) => target,
                Err(e) => {
                    debug!(key = %key, error = %e, "Cart update rejected");
                    return Err(record(&mut state, e));
                }
            };

            let before = state.cart.clone();
            match &target {
                Some(line) => state.cart.put(line.clone()),
                None => {
                    state.cart.remove(&key);
                }
            }

            if state.session.user().is_none() {
                self.reallocate(&mut state);
                if let Err(e) = self.guest.save(&state.cart, self.services.clock.now()) {
                    warn!(key = %key, error = %e, "Failed to persist guest cart, reverting");
                    state.cart = before;
                    state.touch();
                    return Err(record(&mut state, e));
                }
                debug!(key = %key, "Guest cart updated");
                return Ok(());
            }

            let version = state.next_version();
            state.sync.entry(key.clone()).or_default().begin(version);
            self.reallocate(&mut state);
            let ticket = self.send_order.ticket(&key);
            debug!(key = %key, version, "Applied optimistic cart update");

            let pending = PendingMutation {
                version,
                key,
                target,
                before,
                generation: state.generation,
            };
            (pending, ticket)
        };

        ticket.turn().await;
        let result = self.send(&pending).await;
        let outcome = self.settle(pending, result);
        drop(ticket);

        if let Ok(true) = outcome {
            if let Err(e) = self.reload_credit(true).await {
                warn!(error = %e, "Failed to refresh credit after cart reached its minimum");
            }
        }
        outcome.map(|_| ())
    }

    /// Validate `change` against the current line and compute the target.
    fn plan(
        &self,
        state: &CartState,
        key: &LineKey,
        change: LineChange,
    ) -> Result<Option<CartLine>, CartError> {
        let current = state.cart.get(key);
        let existing = || current.ok_or_else(|| CartError::LineNotFound(key.to_string()));

        let target = match change {
            LineChange::Add {
                quantity,
                price,
                display,
            } => {
                if quantity == 0 {
                    return Err(CartError::InvalidQuantity(0));
                }
                price.validate(state.cart.currency())?;
                match current {
                    Some(line) => {
                        let total = line
                            .quantity
                            .checked_add(quantity)
                            .ok_or(CartError::Overflow)?;
                        let mut merged = line.with_quantity(total);
                        merged.reprice(price, display);
                        Some(merged)
                    }
                    None => Some(CartLine::new(key.clone(), quantity, price, display)),
                }
            }
            LineChange::Adjust(delta) => {
                let line = existing()?;
                let next = i64::from(line.quantity).saturating_add(delta);
                if next <= 0 {
                    None
                } else {
                    let next = u32::try_from(next).map_err(|_| CartError::Overflow)?;
                    Some(line.with_quantity(next))
                }
            }
            LineChange::Set(quantity) => {
                let line = existing()?;
                (quantity > 0).then(|| line.with_quantity(quantity))
            }
            LineChange::Remove => {
                existing()?;
                None
            }
        };

        if let Some(line) = &target {
            let max = self.config.max_quantity_per_line;
            if line.quantity > max {
                return Err(CartError::QuantityExceedsLimit(line.quantity, max));
            }
            let previous = current.map_or(0, |l| l.quantity);
            if line.quantity > previous {
                self.check_stock(key, line.quantity)?;
            }
        }
        Ok(target)
    }

    fn check_stock(&self, key: &LineKey, requested: u32) -> Result<(), CartError> {
        let available = self
            .services
            .catalog
            .find_product(&key.product_id)
            .and_then(|p| p.stock_for(key.variant_id.as_ref(), key.size_id.as_ref()));
        match available {
            Some(available) if requested > available => Err(CartError::InsufficientStock {
                line: key.to_string(),
                requested,
                available,
            }),
            _ => Ok(()),
        }
    }

    /// Issue the remote write for `pending`. Runs on the key's turn, so
    /// whether the line exists remotely reflects every earlier write.
    async fn send(&self, pending: &PendingMutation) -> Result<Option<RemoteLineAck>, RemoteError> {
        let (exists, credit_hint) = {
            let state = self.lock_state();
            let currency = state.cart.currency();
            (
                state.exists_remotely(&pending.key),
                state
                    .cart
                    .get(&pending.key)
                    .map_or(Money::zero(currency), |l| l.credit_allocated),
            )
        };

        let remote = &self.services.remote;
        match (&pending.target, exists) {
            (Some(line), true) => remote
                .set_line_quantity(&pending.key, line.quantity, credit_hint)
                .await
                .map(Some),
            (Some(line), false) => {
                let payload = CartLine {
                    credit_allocated: credit_hint,
                    ..line.clone()
                };
                remote.create_line(&payload).await.map(Some)
            }
            (None, true) => remote.delete_line(&pending.key).await.map(|()| None),
            (None, false) => Ok(None),
        }
    }

    /// Apply the server's answer. Returns whether the cart just reached the
    /// credit's minimum qualifying total.
    fn settle(
        &self,
        pending: PendingMutation,
        result: Result<Option<RemoteLineAck>, RemoteError>,
    ) -> Result<bool, CartError> {
        let PendingMutation {
            version,
            key,
            target,
            before,
            generation,
        } = pending;
        let mut state = self.lock_state();

        match result {
            Ok(ack) => {
                let settlement = state
                    .sync
                    .entry(key.clone())
                    .or_default()
                    .confirm(version, target);
                let mut crossed = false;
                if settlement == Settlement::Confirmed {
                    if let Some(ack) = ack {
                        reconcile_credit(&mut state, &key, ack.credit_allocated);
                    }
                    crossed = self.crossed_minimum(&state, &before);
                    debug!(key = %key, version, "Cart update confirmed");
                } else {
                    debug!(key = %key, version, "Stale acknowledgement, newer update in flight");
                }
                state.touch();
                state.prune_sync(&key);
                Ok(crossed)
            }
            Err(e) => {
                let settlement = state.sync.entry(key.clone()).or_default().reject(version);
                match settlement {
                    Settlement::RolledBack(restored) => {
                        if state.generation == generation {
                            state.cart = before;
                            state.touch();
                        } else {
                            match restored {
                                Some(line) => state.cart.put(line),
                                None => {
                                    state.cart.remove(&key);
                                }
                            }
                            self.reallocate(&mut state);
                        }
                        warn!(key = %key, version, error = %e, "Cart update failed, rolled back");
                    }
                    Settlement::Confirmed | Settlement::Superseded => {
                        state.touch();
                        debug!(key = %key, version, error = %e, "Superseded cart update failed");
                    }
                }
                state.prune_sync(&key);
                Err(record(&mut state, e.into()))
            }
        }
    }

    fn crossed_minimum(&self, state: &CartState, before: &Cart) -> bool {
        if !self.config.refresh_credit_on_eligibility {
            return false;
        }
        let Some(credit) = &state.credit else {
            return false;
        };
        let minimum = credit.minimum_cart_total;
        if !minimum.is_positive() {
            return false;
        }
        let was_below = before.subtotal().try_cmp(&minimum) == Some(Ordering::Less);
        let now_meets = matches!(
            state.cart.subtotal().try_cmp(&minimum),
            Some(Ordering::Greater | Ordering::Equal)
        );
        was_below && now_meets
    }

    async fn sign_in(&self, user: UserId) -> Result<MigrationReport, CartError> {
        let local = self.lock_state().cart.clone();
        let engine = MigrationEngine::new(
            self.services.remote.as_ref(),
            &self.guest,
            self.config.currency,
            self.config.max_quantity_per_line,
        );

        let outcome = match engine.run(&local, self.services.clock.now()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(user = %user, error = %e, "Cart migration aborted, staying in guest mode");
                return Err(self.fail(e));
            }
        };

        {
            let mut state = self.lock_state();
            state.authenticate(user.clone(), outcome.cart);
            self.reallocate(&mut state);
        }
        info!(user = %user, "Signed in");

        if let Err(e) = self.reload_credit(false).await {
            warn!(user = %user, error = %e, "Failed to load promotional credit after sign-in");
        }
        Ok(outcome.report)
    }

    fn sign_out(&self, previous: &UserId) {
        let cart = load_guest_cart(&self.guest, self.config.currency);
        let mut state = self.lock_state();
        state.become_guest(cart);
        self.reallocate(&mut state);
        info!(user = %previous, "Signed out, cart back in guest mode");
    }

    /// Load the signed-in user's credit and reallocate. `bypass_cache`
    /// asks the source for a fresh read instead of a possibly cached one.
    async fn reload_credit(
        &self,
        bypass_cache: bool,
    ) -> Result<Option<PromotionalCredit>, CartError> {
        let (user, epoch) = {
            let state = self.lock_state();
            (state.session.user().cloned(), state.session_epoch)
        };
        let Some(user) = user else {
            return Ok(None);
        };

        let credits = &self.services.credits;
        let credit = if bypass_cache {
            credits.refresh_credit(&user).await?
        } else {
            credits.fetch_credit(&user).await?
        };

        let mut state = self.lock_state();
        if state.session_epoch != epoch {
            debug!(user = %user, "Discarding credit fetched for a previous session");
            return Ok(None);
        }
        state.credit = credit.clone();
        self.reallocate(&mut state);
        debug!(user = %user, has_credit = credit.is_some(), "Promotional credit updated");
        Ok(credit)
    }

    /// Recompute allocation from scratch.
    fn reallocate(&self, state: &mut CartState) {
        state.cart = allocate(
            &state.cart,
            state.credit.as_ref(),
            state.apply_credit,
            self.services.catalog.as_ref(),
            self.services.clock.now(),
        );
        state.touch();
    }

    fn fail(&self, err: CartError) -> CartError {
        let mut state = self.lock_state();
        record(&mut state, err)
    }

    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record(state: &mut CartState, err: CartError) -> CartError {
    state.last_error = Some(err.clone());
    err
}

fn load_guest_cart(guest: &GuestCartStorage, currency: Currency) -> Cart {
    match guest.load(currency) {
        Ok(Some(cart)) => cart,
        Ok(None) => Cart::new(currency),
        Err(e) => {
            warn!(namespace = guest.namespace(), error = %e, "Discarding unreadable guest cart");
            Cart::new(currency)
        }
    }
}

/// Take the server's credit for a confirmed line, bounded so the cart never
/// carries more credit than the balance or the line's subtotal.
fn reconcile_credit(state: &mut CartState, key: &LineKey, reported: Money) {
    let currency = state.cart.currency();
    let zero = Money::zero(currency);
    let balance = match (&state.credit, state.apply_credit) {
        (Some(credit), true) if credit.currency() == currency => credit.amount.floor_zero(),
        _ => zero,
    };
    let own = state.cart.get(key).map_or(zero, |l| l.credit_allocated);
    let others = state.cart.credit_total().saturating_sub(&own);

    let Some(line) = state.cart.get_mut(key) else {
        return;
    };
    let cap = line
        .effective_subtotal()
        .min_amount(&balance.saturating_sub(&others))
        .floor_zero();
    let reported = if reported.currency == currency {
        reported.floor_zero()
    } else {
        zero
    };
    line.credit_allocated = reported.min_amount(&cap);
}
