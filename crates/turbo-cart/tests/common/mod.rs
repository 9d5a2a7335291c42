//! Shared fakes for the store integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use turbo_cache::{Cache, CacheError, LocalStore};
use turbo_cart::prelude::*;
use turbo_cart::store::GuestCartStorage;

pub const USER: &str = "u-1";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
}

pub fn usd(cents: i64) -> Money {
    Money::new(cents, Currency::USD)
}

pub fn key(product: &str) -> LineKey {
    LineKey::product(product)
}

pub fn add(product: &str, quantity: u32, cents: i64) -> AddLineRequest {
    AddLineRequest::new(product, None, None, quantity, PriceSnapshot::list(usd(cents)))
        .with_display(LineDisplay::named(product))
}

pub fn line(product: &str, quantity: u32, cents: i64) -> CartLine {
    CartLine::new(
        key(product),
        quantity,
        PriceSnapshot::list(usd(cents)),
        LineDisplay::named(product),
    )
}

pub fn credit(amount: i64, minimum: i64) -> PromotionalCredit {
    PromotionalCredit::unrestricted(usd(amount), now() - Duration::days(1)).with_minimum(usd(minimum))
}

pub fn catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    for id in ["tee", "mug", "cap", "line1", "line2", "a", "b"] {
        catalog.insert(ProductMeta::new(id).with_category(CategoryId::new("merch")));
    }
    catalog.insert(
        ProductMeta::new("limited")
            .with_category(CategoryId::new("merch"))
            .with_variant(VariantMeta::new("red", "Red").with_stock(3)),
    );
    catalog
}

// ----------------------------------------------------------------------
// Remote cart
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    List,
    Create(LineKey, u32),
    SetQuantity(LineKey, u32),
    Delete(LineKey),
    ClearAll,
}

/// In-memory remote cart with failure injection and a valve that holds
/// responses until the test opens it.
#[derive(Default)]
pub struct FakeRemote {
    lines: Mutex<BTreeMap<LineKey, CartLine>>,
    calls: Mutex<Vec<RemoteCall>>,
    script: Mutex<VecDeque<bool>>,
    failing_keys: Mutex<HashSet<LineKey>>,
    fail_listing: AtomicBool,
    fail_clear: AtomicBool,
    reported_credit: Mutex<Option<Money>>,
    valve: Arc<RwLock<()>>,
}

impl FakeRemote {
    pub fn seed(&self, line: CartLine) {
        self.lines.lock().unwrap().insert(line.key.clone(), line);
    }

    pub fn line(&self, key: &LineKey) -> Option<CartLine> {
        self.lines.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Outcomes of the next line writes, in order; `true` fails the write.
    pub fn script(&self, outcomes: &[bool]) {
        self.script.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn fail_key(&self, key: LineKey) {
        self.failing_keys.lock().unwrap().insert(key);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    /// Report this credit for every confirmed line instead of echoing.
    pub fn report_credit(&self, credit: Money) {
        *self.reported_credit.lock().unwrap() = Some(credit);
    }

    /// Hold every response until the guard is dropped.
    pub async fn hold(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.valve).write_owned().await
    }

    /// Yield until at least `n` calls have been issued.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls.lock().unwrap().len() < n {
            tokio::task::yield_now().await;
        }
    }

    fn log(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pass_valve(&self) {
        let _open = self.valve.read().await;
    }

    fn write_fails(&self, key: &LineKey) -> bool {
        let scripted = self.script.lock().unwrap().pop_front().unwrap_or(false);
        scripted || self.failing_keys.lock().unwrap().contains(key)
    }

    fn ack(&self, echoed: Money) -> RemoteLineAck {
        RemoteLineAck {
            credit_allocated: self.reported_credit.lock().unwrap().unwrap_or(echoed),
        }
    }
}

#[async_trait]
impl RemoteCart for FakeRemote {
    async fn list_lines(&self) -> Result<Vec<CartLine>, RemoteError> {
        self.log(RemoteCall::List);
        self.pass_valve().await;
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".into()));
        }
        Ok(self.lines.lock().unwrap().values().cloned().collect())
    }

    async fn create_line(&self, line: &CartLine) -> Result<RemoteLineAck, RemoteError> {
        self.log(RemoteCall::Create(line.key.clone(), line.quantity));
        self.pass_valve().await;
        if self.write_fails(&line.key) {
            return Err(RemoteError::Server {
                status: 503,
                message: "unavailable".into(),
            });
        }
        self.lines
            .lock()
            .unwrap()
            .insert(line.key.clone(), line.clone());
        Ok(self.ack(line.credit_allocated))
    }

    async fn set_line_quantity(
        &self,
        key: &LineKey,
        quantity: u32,
        credit_to_apply: Money,
    ) -> Result<RemoteLineAck, RemoteError> {
        self.log(RemoteCall::SetQuantity(key.clone(), quantity));
        self.pass_valve().await;
        if self.write_fails(key) {
            return Err(RemoteError::Server {
                status: 500,
                message: "boom".into(),
            });
        }
        let mut lines = self.lines.lock().unwrap();
        let Some(line) = lines.get_mut(key) else {
            return Err(RemoteError::NotFound(key.to_string()));
        };
        line.quantity = quantity;
        line.credit_allocated = credit_to_apply;
        Ok(self.ack(credit_to_apply))
    }

    async fn delete_line(&self, key: &LineKey) -> Result<(), RemoteError> {
        self.log(RemoteCall::Delete(key.clone()));
        self.pass_valve().await;
        if self.write_fails(key) {
            return Err(RemoteError::Transport("timeout".into()));
        }
        self.lines.lock().unwrap().remove(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), RemoteError> {
        self.log(RemoteCall::ClearAll);
        self.pass_valve().await;
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("timeout".into()));
        }
        self.lines.lock().unwrap().clear();
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Credit source
// ----------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCredits {
    credit: Mutex<Option<PromotionalCredit>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
    refreshes: AtomicUsize,
    invalidations: AtomicUsize,
}

impl FakeCredits {
    pub fn set(&self, credit: Option<PromotionalCredit>) {
        *self.credit.lock().unwrap() = credit;
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    fn current(&self) -> Result<Option<PromotionalCredit>, RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("credit service down".into()));
        }
        Ok(self.credit.lock().unwrap().clone())
    }
}

#[async_trait]
impl CreditSource for FakeCredits {
    async fn fetch_credit(&self, _user: &UserId) -> Result<Option<PromotionalCredit>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.current()
    }

    async fn invalidate_credit(&self, _user: &UserId) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    async fn refresh_credit(
        &self,
        _user: &UserId,
    ) -> Result<Option<PromotionalCredit>, RemoteError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.current()
    }
}

// ----------------------------------------------------------------------
// Local storage
// ----------------------------------------------------------------------

/// The in-memory cache with switchable write failures.
pub struct FlakyStore {
    inner: Cache,
    fail_writes: AtomicBool,
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self {
            inner: Cache::in_memory(),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl FlakyStore {
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl LocalStore for FlakyStore {
    fn get_raw(&self, namespace: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.inner.get_raw(namespace)
    }

    fn set_raw(&self, namespace: &str, bytes: &[u8]) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::StoreError("quota exceeded".into()));
        }
        self.inner.set_raw(namespace, bytes)
    }

    fn remove(&self, namespace: &str) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::StoreError("quota exceeded".into()));
        }
        self.inner.remove(namespace)
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<CartStore>,
    pub remote: Arc<FakeRemote>,
    pub credits: Arc<FakeCredits>,
    pub local: Arc<FlakyStore>,
    pub config: StoreConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(FakeRemote::default()),
            Arc::new(FakeCredits::default()),
            Arc::new(FlakyStore::default()),
        )
    }

    pub fn with_parts(
        config: StoreConfig,
        remote: Arc<FakeRemote>,
        credits: Arc<FakeCredits>,
        local: Arc<FlakyStore>,
    ) -> Self {
        let services = CartServices::new(
            Arc::new(catalog()),
            remote.clone(),
            credits.clone(),
            local.clone(),
        )
        .with_clock(Arc::new(FixedClock(now())));
        Self {
            store: Arc::new(CartStore::new(config.clone(), services)),
            remote,
            credits,
            local,
            config,
        }
    }

    /// A fresh store over the same collaborators, as after a page reload.
    pub fn reopen(&self) -> Self {
        Self::with_parts(
            self.config.clone(),
            self.remote.clone(),
            self.credits.clone(),
            self.local.clone(),
        )
    }

    /// A store signed in as [`USER`] with an empty remote cart.
    pub async fn signed_in() -> Self {
        let harness = Self::new();
        harness
            .store
            .set_user(Some(UserId::new(USER)))
            .await
            .unwrap();
        harness.remote.reset_calls();
        harness
    }

    pub fn guest_storage(&self) -> GuestCartStorage {
        GuestCartStorage::new(self.local.clone(), self.config.guest_namespace.clone())
    }

    pub fn quantity(&self, product: &str) -> Option<u32> {
        self.store.line(&key(product)).map(|l| l.quantity)
    }

    pub fn credit_on(&self, product: &str) -> Option<i64> {
        self.store
            .line(&key(product))
            .map(|l| l.credit_allocated.amount_cents)
    }
}
