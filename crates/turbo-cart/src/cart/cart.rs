//! The cart: lines keyed by [`LineKey`].

use crate::cart::{CartLine, LineKey};
use crate::money::{Currency, Money};
use std::collections::BTreeMap;
use tracing::warn;

/// Maximum quantity allowed per line unless configured otherwise.
pub const MAX_QUANTITY_PER_LINE: u32 = 9999;

/// A shopping cart.
///
/// Keys are unique and iteration follows key order, so anything computed
/// by walking the cart is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    currency: Currency,
    lines: BTreeMap<LineKey, CartLine>,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            lines: BTreeMap::new(),
        }
    }

    /// Build a cart from lines. Zero-quantity lines are dropped and a later
    /// line replaces an earlier one with the same key.
    pub fn from_lines(currency: Currency, lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new(currency);
        for line in lines {
            cart.put(line);
        }
        cart
    }

    /// Build a cart from lines held outside the store, such as the server
    /// cart or a persisted guest cart. Lines that fail
    /// [`CartLine::validate`] are dropped with a warning.
    pub fn from_external_lines(
        currency: Currency,
        max_quantity: u32,
        lines: impl IntoIterator<Item = CartLine>,
    ) -> Self {
        let mut cart = Self::new(currency);
        for line in lines {
            match line.validate(currency, max_quantity) {
                Ok(()) => cart.put(line),
                Err(e) => warn!(key = %line.key, error = %e, "Dropping invalid cart line"),
            }
        }
        cart
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Insert or replace a line. A line with quantity 0 removes the key.
    pub fn put(&mut self, line: CartLine) {
        if line.quantity == 0 {
            self.lines.remove(&line.key);
        } else {
            self.lines.insert(line.key.clone(), line);
        }
    }

    /// Remove a line, returning it.
    pub fn remove(&mut self, key: &LineKey) -> Option<CartLine> {
        self.lines.remove(key)
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn get(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &LineKey) -> Option<&mut CartLine> {
        self.lines.get_mut(key)
    }

    pub fn contains(&self, key: &LineKey) -> bool {
        self.lines.contains_key(key)
    }

    /// Lines in key order.
    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &LineKey> {
        self.lines.keys()
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u64 {
        self.lines.values().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of effective line subtotals, before credit.
    pub fn subtotal(&self) -> Money {
        self.lines
            .values()
            .fold(Money::zero(self.currency), |acc, line| {
                acc.saturating_add(&line.effective_subtotal())
            })
    }

    /// Sum of credit allocated across lines.
    pub fn credit_total(&self) -> Money {
        self.lines
            .values()
            .fold(Money::zero(self.currency), |acc, line| {
                acc.saturating_add(&line.credit_allocated)
            })
    }

    /// Amount payable: subtotal minus allocated credit when `apply_credit`
    /// is set, floored at zero.
    pub fn total(&self, apply_credit: bool) -> Money {
        let subtotal = self.subtotal();
        if apply_credit {
            subtotal.saturating_sub(&self.credit_total()).floor_zero()
        } else {
            subtotal
        }
    }

    /// Zero the credit on every line.
    pub fn clear_credit(&mut self) {
        let zero = Money::zero(self.currency);
        for line in self.lines.values_mut() {
            line.credit_allocated = zero;
        }
    }

    /// Consume the cart, yielding lines in key order.
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines.into_values().collect()
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new(Currency::default())
    }
}
