//! Type-safe Key-Value caching layer for TurboCommerce.
//!
//! Provides namespace-addressed durable storage with automatic JSON
//! serialization. The cart engine keeps the guest cart here; on Spin the
//! values live in the Key-Value Store, natively they live in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cache::{Cache, LocalStore, LocalStoreExt};
//!
//! let cache = Cache::in_memory();
//!
//! // Store a value
//! cache.set_json("cart:guest", &guest_cart)?;
//!
//! // Retrieve a value
//! let cart: Option<GuestCart> = cache.get_json("cart:guest")?;
//!
//! // Delete a value
//! cache.remove("cart:guest")?;
//! ```

mod error;
mod kv;

pub use error::CacheError;
pub use kv::{Cache, LocalStore, LocalStoreExt};
