//! Shopping cart module.
//!
//! Contains the cart, its lines and composite keys, and unit price
//! resolution under bulk tiers.

mod cart;
mod line;
mod pricing;

pub use cart::{Cart, MAX_QUANTITY_PER_LINE};
pub use line::{CartLine, LineDisplay, LineKey};
pub use pricing::{resolve_unit_price, tiers_are_ordered, BulkPriceTier, PriceSnapshot};
