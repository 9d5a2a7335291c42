//! Promotional credit ("free cash") descriptor.

use crate::catalog::CategoryRef;
use crate::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A capped, time-boxed, optionally category-restricted credit balance.
///
/// Created and expired by server-side policy; the cart engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromotionalCredit {
    /// Balance available to allocate.
    pub amount: Money,
    /// Start of the validity window (inclusive).
    pub start_date: DateTime<Utc>,
    /// End of the validity window (inclusive). `None` is open-ended.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Set once the credit has been spent on an order.
    #[serde(default)]
    pub is_used: bool,
    /// Set by the server when the credit lapsed.
    #[serde(default)]
    pub is_expired: bool,
    /// Cart subtotal required before any line qualifies.
    pub minimum_cart_total: Money,
    /// Category restriction, consulted unless `applies_to_all_products`.
    #[serde(default)]
    pub category: Option<CategoryRef>,
    /// Optional narrower restriction within `category`.
    #[serde(default)]
    pub sub_category: Option<CategoryRef>,
    /// When set, no category restriction applies.
    #[serde(default)]
    pub applies_to_all_products: bool,
}

impl PromotionalCredit {
    /// An unrestricted credit valid from `start_date` with no minimum.
    pub fn unrestricted(amount: Money, start_date: DateTime<Utc>) -> Self {
        Self {
            amount,
            start_date,
            end_date: None,
            is_used: false,
            is_expired: false,
            minimum_cart_total: Money::zero(amount.currency),
            category: None,
            sub_category: None,
            applies_to_all_products: true,
        }
    }

    /// Restrict the credit to a category.
    pub fn for_category(mut self, category: impl Into<CategoryRef>) -> Self {
        self.category = Some(category.into());
        self.applies_to_all_products = false;
        self
    }

    /// Narrow the restriction to a sub-category.
    pub fn for_sub_category(mut self, sub_category: impl Into<CategoryRef>) -> Self {
        self.sub_category = Some(sub_category.into());
        self.applies_to_all_products = false;
        self
    }

    /// Require a minimum cart subtotal.
    pub fn with_minimum(mut self, minimum: Money) -> Self {
        self.minimum_cart_total = minimum;
        self
    }

    /// Set the end of the validity window.
    pub fn ending(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn currency(&self) -> Currency {
        self.amount.currency
    }

    /// Not used, not expired, and `now` inside the validity window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_used || self.is_expired {
            return false;
        }
        if now < self.start_date {
            return false;
        }
        if let Some(end) = self.end_date {
            if now > end {
                return false;
            }
        }
        true
    }

    /// Nothing left to allocate.
    pub fn is_exhausted(&self) -> bool {
        !self.amount.is_positive()
    }
}
