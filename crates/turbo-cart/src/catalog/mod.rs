//! Product catalog module.
//!
//! The read-only view of the catalog the cart engine consumes: product
//! categories, variants, sizes and stock.

mod category;
mod product;

pub use category::{CategoryRef, EmbeddedCategory};
pub use product::{Catalog, InMemoryCatalog, ProductMeta, SizeMeta, VariantMeta};
