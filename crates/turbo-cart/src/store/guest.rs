//! Guest cart persistence in durable local storage.

use crate::cart::{Cart, CartLine, MAX_QUANTITY_PER_LINE};
use crate::error::CartError;
use crate::money::Currency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use turbo_cache::{LocalStore, LocalStoreExt};

/// What is written under the guest namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestCartRecord {
    pub lines: Vec<CartLine>,
    pub saved_at: DateTime<Utc>,
}

/// Reads and writes the guest cart under a single namespace.
#[derive(Clone)]
pub struct GuestCartStorage {
    local: Arc<dyn LocalStore>,
    namespace: String,
    max_quantity: u32,
}

impl GuestCartStorage {
    pub fn new(local: Arc<dyn LocalStore>, namespace: impl Into<String>) -> Self {
        Self {
            local,
            namespace: namespace.into(),
            max_quantity: MAX_QUANTITY_PER_LINE,
        }
    }

    /// Per-line quantity ceiling applied when loading.
    pub fn with_max_quantity(mut self, max_quantity: u32) -> Self {
        self.max_quantity = max_quantity;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The persisted guest cart, or `None` when nothing is stored.
    ///
    /// Stored lines that no longer validate are dropped.
    pub fn load(&self, currency: Currency) -> Result<Option<Cart>, CartError> {
        let record: Option<GuestCartRecord> = self.local.get_json(&self.namespace)?;
        Ok(record.map(|r| Cart::from_external_lines(currency, self.max_quantity, r.lines)))
    }

    /// Persist `cart`. Allocated credit is not stored; guests have none.
    pub fn save(&self, cart: &Cart, now: DateTime<Utc>) -> Result<(), CartError> {
        let mut lines = cart.clone();
        lines.clear_credit();
        let record = GuestCartRecord {
            lines: lines.into_lines(),
            saved_at: now,
        };
        self.local.set_json(&self.namespace, &record)?;
        Ok(())
    }

    /// Remove the namespace entirely.
    pub fn clear(&self) -> Result<(), CartError> {
        self.local.remove(&self.namespace)?;
        Ok(())
    }

    pub fn exists(&self) -> Result<bool, CartError> {
        Ok(self.local.exists(&self.namespace)?)
    }
}

impl std::fmt::Debug for GuestCartStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestCartStorage")
            .field("namespace", &self.namespace)
            .field("max_quantity", &self.max_quantity)
            .finish_non_exhaustive()
    }
}
