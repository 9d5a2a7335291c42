//! Cart line and its composite key.

use crate::cart::{resolve_unit_price, BulkPriceTier, PriceSnapshot};
use crate::error::CartError;
use crate::ids::{ProductId, SizeId, VariantId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a cart line: product plus optional variant and size.
///
/// Ordering is product, then variant, then size, with an absent selector
/// sorting before any present one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    #[serde(default)]
    pub size_id: Option<SizeId>,
}

impl LineKey {
    /// Sentinel rendered for an absent selector.
    pub const DEFAULT_SELECTOR: &'static str = "default";

    pub fn new(
        product_id: impl Into<ProductId>,
        variant_id: Option<VariantId>,
        size_id: Option<SizeId>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id,
            size_id,
        }
    }

    /// Key for a product sold without variant or size selection.
    pub fn product(product_id: impl Into<ProductId>) -> Self {
        Self::new(product_id, None, None)
    }

    /// Set the variant selector.
    pub fn with_variant(mut self, variant_id: impl Into<VariantId>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Set the size selector.
    pub fn with_size(mut self, size_id: impl Into<SizeId>) -> Self {
        self.size_id = Some(size_id.into());
        self
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.product_id,
            self.variant_id
                .as_ref()
                .map_or(Self::DEFAULT_SELECTOR, VariantId::as_str),
            self.size_id
                .as_ref()
                .map_or(Self::DEFAULT_SELECTOR, SizeId::as_str),
        )
    }
}

/// Rendering metadata. Carried along, never interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineDisplay {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_label: Option<String>,
}

impl LineDisplay {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One purchasable unit in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    /// Composite identity.
    pub key: LineKey,
    /// Quantity, at least 1 for a stored line.
    pub quantity: u32,
    /// List unit price.
    pub unit_price: Money,
    /// Sale unit price, at most `unit_price`.
    #[serde(default)]
    pub discounted_unit_price: Option<Money>,
    /// Wholesale tiers, ascending by threshold.
    #[serde(default)]
    pub bulk_price_tiers: Vec<BulkPriceTier>,
    /// Promotional credit applied to this line.
    pub credit_allocated: Money,
    /// Rendering metadata.
    #[serde(default)]
    pub display: LineDisplay,
}

impl CartLine {
    /// Create a line from an add request. Credit starts at zero.
    pub fn new(key: LineKey, quantity: u32, price: PriceSnapshot, display: LineDisplay) -> Self {
        let currency = price.unit_price.currency;
        Self {
            key,
            quantity,
            unit_price: price.unit_price,
            discounted_unit_price: price.discounted_unit_price,
            bulk_price_tiers: price.bulk_price_tiers,
            credit_allocated: Money::zero(currency),
            display,
        }
    }

    /// Unit price before tiering: the sale price when present.
    pub fn base_unit_price(&self) -> Money {
        self.discounted_unit_price.unwrap_or(self.unit_price)
    }

    /// Unit price after discount and bulk tiering.
    pub fn effective_unit_price(&self) -> Money {
        resolve_unit_price(self.quantity, &self.bulk_price_tiers, self.base_unit_price())
    }

    /// Effective unit price times quantity.
    pub fn effective_subtotal(&self) -> Money {
        self.effective_unit_price().saturating_times(self.quantity)
    }

    /// Copy of this line at a different quantity, with credit reset.
    ///
    /// Credit is recomputed by the allocator after every quantity change.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            quantity,
            credit_allocated: Money::zero(self.unit_price.currency),
            ..self.clone()
        }
    }

    /// The pricing half of this line.
    pub fn price_snapshot(&self) -> PriceSnapshot {
        PriceSnapshot {
            unit_price: self.unit_price,
            discounted_unit_price: self.discounted_unit_price,
            bulk_price_tiers: self.bulk_price_tiers.clone(),
        }
    }

    /// Check a line that came from outside the store (server or storage).
    pub fn validate(&self, currency: Currency, max_quantity: u32) -> Result<(), CartError> {
        if self.quantity == 0 {
            return Err(CartError::InvalidQuantity(0));
        }
        if self.quantity > max_quantity {
            return Err(CartError::QuantityExceedsLimit(self.quantity, max_quantity));
        }
        self.price_snapshot().validate(currency)?;
        if self.credit_allocated.currency != currency {
            return Err(CartError::CurrencyMismatch {
                expected: currency.code().to_string(),
                got: self.credit_allocated.currency.code().to_string(),
            });
        }
        Ok(())
    }

    /// Refresh prices and display from a newer snapshot, keeping quantity.
    pub fn reprice(&mut self, price: PriceSnapshot, display: LineDisplay) {
        self.unit_price = price.unit_price;
        self.discounted_unit_price = price.discounted_unit_price;
        self.bulk_price_tiers = price.bulk_price_tiers;
        self.display = display;
    }
}
