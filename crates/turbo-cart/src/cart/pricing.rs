//! Unit price resolution under quantity-tiered (bulk) pricing.

use crate::error::CartError;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// A wholesale tier: buying at least `min_quantity` units unlocks `unit_price`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkPriceTier {
    /// Quantity threshold (inclusive).
    pub min_quantity: u32,
    /// Wholesale unit price once the threshold is met.
    pub unit_price: Money,
}

impl BulkPriceTier {
    pub fn new(min_quantity: u32, unit_price: Money) -> Self {
        Self {
            min_quantity,
            unit_price,
        }
    }
}

/// Resolve the unit price for `quantity`.
///
/// Returns the price of the qualifying tier with the highest threshold, or
/// `base_price` when no tier qualifies (including an empty tier list). On a
/// list sorted ascending by threshold this is the tier found by scanning
/// from the top down. The list is never re-sorted; ordering is enforced when
/// a [`PriceSnapshot`] is validated.
pub fn resolve_unit_price(quantity: u32, tiers: &[BulkPriceTier], base_price: Money) -> Money {
    tiers
        .iter()
        .filter(|tier| tier.min_quantity <= quantity)
        .max_by_key(|tier| tier.min_quantity)
        .map_or(base_price, |tier| tier.unit_price)
}

/// Whether tiers ascend by threshold with non-increasing prices.
pub fn tiers_are_ordered(tiers: &[BulkPriceTier]) -> bool {
    tiers.windows(2).all(|pair| match pair {
        [lower, higher] => {
            lower.min_quantity < higher.min_quantity
                && higher.unit_price.amount_cents <= lower.unit_price.amount_cents
        }
        _ => true,
    })
}

/// Pricing captured when a product is added to the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceSnapshot {
    /// List (non-discounted) unit price.
    pub unit_price: Money,
    /// Sale unit price, at most `unit_price`.
    #[serde(default)]
    pub discounted_unit_price: Option<Money>,
    /// Wholesale tiers, ascending by threshold.
    #[serde(default)]
    pub bulk_price_tiers: Vec<BulkPriceTier>,
}

impl PriceSnapshot {
    /// A plain list price with no sale and no tiers.
    pub fn list(unit_price: Money) -> Self {
        Self {
            unit_price,
            discounted_unit_price: None,
            bulk_price_tiers: Vec::new(),
        }
    }

    /// Set the sale price.
    pub fn with_discount(mut self, discounted: Money) -> Self {
        self.discounted_unit_price = Some(discounted);
        self
    }

    /// Set the wholesale tiers.
    pub fn with_tiers(mut self, tiers: Vec<BulkPriceTier>) -> Self {
        self.bulk_price_tiers = tiers;
        self
    }

    /// Check the snapshot against the cart currency and pricing invariants.
    pub fn validate(&self, currency: Currency) -> Result<(), CartError> {
        let prices = std::iter::once(&self.unit_price)
            .chain(self.discounted_unit_price.iter())
            .chain(self.bulk_price_tiers.iter().map(|t| &t.unit_price));
        for price in prices {
            if price.currency != currency {
                return Err(CartError::CurrencyMismatch {
                    expected: currency.code().to_string(),
                    got: price.currency.code().to_string(),
                });
            }
            if price.is_negative() {
                return Err(CartError::InvalidPrice(format!(
                    "negative price {}",
                    price.display()
                )));
            }
        }

        if let Some(discounted) = self.discounted_unit_price {
            if discounted.amount_cents > self.unit_price.amount_cents {
                return Err(CartError::InvalidPrice(format!(
                    "discounted price {} exceeds unit price {}",
                    discounted.display(),
                    self.unit_price.display()
                )));
            }
        }

        if self.bulk_price_tiers.iter().any(|t| t.min_quantity == 0) {
            return Err(CartError::InvalidPrice(
                "bulk tier threshold must be at least 1".to_string(),
            ));
        }
        if !tiers_are_ordered(&self.bulk_price_tiers) {
            return Err(CartError::InvalidPrice(
                "bulk tiers must ascend by quantity with non-increasing prices".to_string(),
            ));
        }

        Ok(())
    }
}
