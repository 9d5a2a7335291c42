//! Shopping cart and promotional credit engine for TurboCommerce.
//!
//! This crate keeps a shopper's in-progress order consistent while it is
//! edited locally and synchronised with the storefront backend:
//!
//! - **Cart**: lines keyed by product, variant and size, with bulk-tier pricing
//! - **Credit**: promotional "free cash" eligibility and greedy allocation
//! - **Store**: optimistic updates with per-line rollback, guest persistence
//! - **Migration**: merging a guest cart into the account cart at sign-in
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use turbo_cart::prelude::*;
//!
//! let services = CartServices::new(
//!     Arc::new(catalog),
//!     Arc::new(remote_cart),
//!     Arc::new(credit_source),
//!     Arc::new(turbo_cache::Cache::in_memory()),
//! );
//! let store = CartStore::new(StoreConfig::default(), services);
//!
//! store
//!     .add_line(AddLineRequest::new(
//!         "rust-book",
//!         None,
//!         None,
//!         2,
//!         PriceSnapshot::list(Money::new(4999, Currency::USD)),
//!     ))
//!     .await?;
//!
//! // Sign-in merges the guest cart into the account cart.
//! let report = store.set_user(Some(UserId::new("u-42"))).await?;
//!
//! store.set_apply_credit(true);
//! println!("Total: {}", store.cart_total().display());
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod credit;
pub mod migration;
pub mod remote;
pub mod store;

pub use error::{CartError, RemoteError};
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{CartError, RemoteError};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Cart
    pub use crate::cart::{
        resolve_unit_price, BulkPriceTier, Cart, CartLine, LineDisplay, LineKey, PriceSnapshot,
    };

    // Catalog
    pub use crate::catalog::{
        Catalog, CategoryRef, InMemoryCatalog, ProductMeta, SizeMeta, VariantMeta,
    };

    // Credit
    pub use crate::credit::{allocate, is_eligible, PromotionalCredit};

    // Store
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::StoreConfig;
    pub use crate::migration::MigrationReport;
    pub use crate::remote::{CreditSource, RemoteCart, RemoteLineAck};
    pub use crate::store::{AddLineRequest, CartServices, CartSnapshot, CartStore, LineView};
}
