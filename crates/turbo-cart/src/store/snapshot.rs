//! Read-only view of the cart handed to checkout and the UI.

use crate::cart::{Cart, CartLine, LineDisplay, LineKey};
use crate::ids::UserId;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// One line as the shopper sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineView {
    pub key: LineKey,
    pub quantity: u32,
    pub unit_price: Money,
    pub effective_unit_price: Money,
    pub subtotal: Money,
    pub credit_allocated: Money,
    pub display: LineDisplay,
    /// A remote write for this line has not settled yet.
    pub pending: bool,
}

impl LineView {
    pub(crate) fn from_line(line: &CartLine, pending: bool) -> Self {
        Self {
            key: line.key.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            effective_unit_price: line.effective_unit_price(),
            subtotal: line.effective_subtotal(),
            credit_allocated: line.credit_allocated,
            display: line.display.clone(),
            pending,
        }
    }
}

/// Everything checkout needs: lines, effective prices, credit and total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub user: Option<UserId>,
    pub currency: Currency,
    pub lines: Vec<LineView>,
    pub item_count: u64,
    pub subtotal: Money,
    pub credit_total: Money,
    pub total: Money,
    pub apply_credit: bool,
    /// Keys with a remote write in flight, including optimistically removed ones.
    pub pending_mutations: usize,
}

impl CartSnapshot {
    pub(crate) fn build(
        user: Option<UserId>,
        cart: &Cart,
        apply_credit: bool,
        is_pending: impl Fn(&LineKey) -> bool,
        pending_mutations: usize,
    ) -> Self {
        let lines: Vec<LineView> = cart
            .lines()
            .map(|line| LineView::from_line(line, is_pending(&line.key)))
            .collect();
        Self {
            user,
            currency: cart.currency(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
            credit_total: cart.credit_total(),
            total: cart.total(apply_credit),
            apply_credit,
            pending_mutations,
            lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, key: &LineKey) -> Option<&LineView> {
        self.lines.iter().find(|l| &l.key == key)
    }
}
