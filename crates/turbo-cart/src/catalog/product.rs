//! Product metadata and the read-only catalog view.

use crate::cart::BulkPriceTier;
use crate::catalog::CategoryRef;
use crate::ids::{ProductId, SizeId, VariantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The catalog facts the cart engine reads about a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductMeta {
    /// Product identifier.
    pub id: ProductId,
    /// Primary category.
    #[serde(default)]
    pub category: Option<CategoryRef>,
    /// Sub-category, if the catalog assigns one.
    #[serde(default)]
    pub sub_category: Option<CategoryRef>,
    /// Purchasable variants.
    #[serde(default)]
    pub variants: Vec<VariantMeta>,
}

impl ProductMeta {
    /// Create product metadata with no category and no variants.
    pub fn new(id: impl Into<ProductId>) -> Self {
        Self {
            id: id.into(),
            category: None,
            sub_category: None,
            variants: Vec::new(),
        }
    }

    /// Set the primary category.
    pub fn with_category(mut self, category: impl Into<CategoryRef>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the sub-category.
    pub fn with_sub_category(mut self, sub_category: impl Into<CategoryRef>) -> Self {
        self.sub_category = Some(sub_category.into());
        self
    }

    /// Add a variant.
    pub fn with_variant(mut self, variant: VariantMeta) -> Self {
        self.variants.push(variant);
        self
    }

    /// Look up a variant.
    pub fn variant(&self, id: &VariantId) -> Option<&VariantMeta> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// Stock available for a variant/size selection, when the catalog tracks it.
    ///
    /// A size-level count wins over the variant-level count. Unknown
    /// selections and untracked stock return `None`.
    pub fn stock_for(&self, variant: Option<&VariantId>, size: Option<&SizeId>) -> Option<u32> {
        let variant = self.variant(variant?)?;
        match size {
            Some(size) => variant
                .sizes
                .iter()
                .find(|s| &s.id == size)
                .and_then(|s| s.stock)
                .or(variant.stock),
            None => variant.stock,
        }
    }
}

/// A purchasable variant (color, material, pack size).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantMeta {
    /// Variant identifier.
    pub id: VariantId,
    /// Display label (e.g., "Red").
    pub label: String,
    /// Wholesale tiers for this variant, ascending by threshold.
    #[serde(default)]
    pub bulk_price_tiers: Vec<BulkPriceTier>,
    /// Sizes offered for this variant.
    #[serde(default)]
    pub sizes: Vec<SizeMeta>,
    /// Stock across all sizes, when tracked at variant level.
    #[serde(default)]
    pub stock: Option<u32>,
}

impl VariantMeta {
    /// Create a variant with no tiers, sizes or stock tracking.
    pub fn new(id: impl Into<VariantId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            bulk_price_tiers: Vec::new(),
            sizes: Vec::new(),
            stock: None,
        }
    }

    /// Track stock at variant level.
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }

    /// Add a size.
    pub fn with_size(mut self, size: SizeMeta) -> Self {
        self.sizes.push(size);
        self
    }
}

/// A size within a variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeMeta {
    /// Size identifier.
    pub id: SizeId,
    /// Display label (e.g., "XL").
    pub label: String,
    /// Units in stock, when tracked.
    #[serde(default)]
    pub stock: Option<u32>,
}

impl SizeMeta {
    pub fn new(id: impl Into<SizeId>, label: impl Into<String>, stock: Option<u32>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            stock,
        }
    }
}

/// Read-only catalog lookup.
///
/// Synchronous on purpose: credit allocation reads it and must finish in one
/// scheduling turn. Hosts back it with an already-fetched snapshot.
pub trait Catalog: Send + Sync {
    /// Find a product, or `None` when the catalog doesn't know it.
    fn find_product(&self, id: &ProductId) -> Option<ProductMeta>;
}

/// Catalog snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: HashMap<ProductId, ProductMeta>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    pub fn insert(&mut self, product: ProductMeta) {
        self.products.insert(product.id.clone(), product);
    }

    /// Builder-style insert.
    pub fn with_product(mut self, product: ProductMeta) -> Self {
        self.insert(product);
        self
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn find_product(&self, id: &ProductId) -> Option<ProductMeta> {
        self.products.get(id).cloned()
    }
}
