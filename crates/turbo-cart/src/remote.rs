//! Contracts for the server-side collaborators.
//!
//! The store talks to two services: the authenticated cart itself and the
//! source of promotional credit. Both are consumed through `Arc<dyn ...>` so
//! hosts can back them with HTTP clients and tests with in-memory fakes.

use crate::cart::{CartLine, LineKey};
use crate::credit::PromotionalCredit;
use crate::error::RemoteError;
use crate::ids::UserId;
use crate::money::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Server acknowledgement of a line create or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLineAck {
    /// Credit the server recorded against the line.
    pub credit_allocated: Money,
}

/// Server-held cart of an authenticated user.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// Every line currently held by the server.
    async fn list_lines(&self) -> Result<Vec<CartLine>, RemoteError>;

    /// Create a line that does not exist remotely yet.
    async fn create_line(&self, line: &CartLine) -> Result<RemoteLineAck, RemoteError>;

    /// Overwrite the quantity of an existing line.
    async fn set_line_quantity(
        &self,
        key: &LineKey,
        quantity: u32,
        credit_to_apply: Money,
    ) -> Result<RemoteLineAck, RemoteError>;

    async fn delete_line(&self, key: &LineKey) -> Result<(), RemoteError>;

    async fn clear_all(&self) -> Result<(), RemoteError>;
}

/// Where promotional credit comes from.
#[async_trait]
pub trait CreditSource: Send + Sync {
    /// Current credit for `user`, if any. May be served from a cache.
    async fn fetch_credit(&self, user: &UserId) -> Result<Option<PromotionalCredit>, RemoteError>;

    /// Drop any cached credit for `user`.
    async fn invalidate_credit(&self, user: &UserId);

    /// Re-read the credit for `user`, bypassing caches.
    async fn refresh_credit(&self, user: &UserId)
        -> Result<Option<PromotionalCredit>, RemoteError>;
}
