//! Guest-to-account cart merge.
//!
//! Runs once when a guest signs in. Remote writes go out one at a time in
//! key order: the merged quantity for a key depends on what the server
//! already holds, and a failed line must not leave the merged view ahead of
//! the server.

use crate::cart::{Cart, CartLine, LineKey};
use crate::error::CartError;
use crate::money::{Currency, Money};
use crate::remote::RemoteCart;
use crate::store::GuestCartStorage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What happened to each guest line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Keys that already existed remotely and had quantities summed.
    pub merged: Vec<LineKey>,
    /// Keys created remotely from the guest cart.
    pub created: Vec<LineKey>,
    /// Keys whose remote write failed. They stay in guest storage.
    pub skipped: Vec<LineKey>,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Result of a migration: the authoritative cart plus the report.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub cart: Cart,
    pub report: MigrationReport,
}

/// Merges a guest cart into the server-held cart.
pub struct MigrationEngine<'a> {
    remote: &'a dyn RemoteCart,
    guest: &'a GuestCartStorage,
    currency: Currency,
    max_quantity: u32,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(
        remote: &'a dyn RemoteCart,
        guest: &'a GuestCartStorage,
        currency: Currency,
        max_quantity: u32,
    ) -> Self {
        Self {
            remote,
            guest,
            currency,
            max_quantity,
        }
    }

    /// Merge `local` into the remote cart.
    ///
    /// Fails only when the remote cart cannot be listed; nothing has been
    /// written at that point and the guest cart is untouched. Individual
    /// line failures are logged, reported as skipped, and kept locally.
    pub async fn run(&self, local: &Cart, now: DateTime<Utc>) -> Result<MigrationOutcome, CartError> {
        let remote_lines = self.remote.list_lines().await?;
        let mut merged =
            Cart::from_external_lines(self.currency, self.max_quantity, remote_lines);
        let mut report = MigrationReport::default();
        let mut leftovers = Cart::new(self.currency);

        info!(
            guest_lines = local.len(),
            remote_lines = merged.len(),
            "Migrating guest cart"
        );

        for line in local.lines() {
            let key = &line.key;
            match merged.get(key).cloned() {
                Some(existing) => {
                    let quantity = existing
                        .quantity
                        .saturating_add(line.quantity)
                        .min(self.max_quantity);
                    match self
                        .remote
                        .set_line_quantity(key, quantity, existing.credit_allocated)
                        .await
                    {
                        Ok(ack) => {
                            let mut updated = existing.with_quantity(quantity);
                            updated.credit_allocated = self.credit_or_zero(ack.credit_allocated);
                            merged.put(updated);
                            debug!(key = %key, quantity, "Merged guest line into remote line");
                            report.merged.push(key.clone());
                        }
                        Err(e) => {
                            warn!(key = %key, error = %e, "Failed to merge guest line, keeping it locally");
                            report.skipped.push(key.clone());
                            leftovers.put(line.clone());
                        }
                    }
                }
                None => {
                    let fresh: CartLine = line.with_quantity(line.quantity.min(self.max_quantity));
                    match self.remote.create_line(&fresh).await {
                        Ok(ack) => {
                            let mut created = fresh;
                            created.credit_allocated = self.credit_or_zero(ack.credit_allocated);
                            debug!(key = %key, quantity = created.quantity, "Created remote line from guest cart");
                            merged.put(created);
                            report.created.push(key.clone());
                        }
                        Err(e) => {
                            warn!(key = %key, error = %e, "Failed to create remote line, keeping it locally");
                            report.skipped.push(key.clone());
                            leftovers.put(line.clone());
                        }
                    }
                }
            }
        }

        self.settle_guest_storage(&leftovers, now);

        info!(
            merged = report.merged.len(),
            created = report.created.len(),
            skipped = report.skipped.len(),
            "Guest cart migration finished"
        );

        Ok(MigrationOutcome {
            cart: merged,
            report,
        })
    }

    /// Discard the guest cart, or shrink it to the lines that did not make it.
    fn settle_guest_storage(&self, leftovers: &Cart, now: DateTime<Utc>) {
        let result = if leftovers.is_empty() {
            self.guest.clear()
        } else {
            self.guest.save(leftovers, now)
        };
        if let Err(e) = result {
            warn!(
                namespace = self.guest.namespace(),
                error = %e,
                "Failed to update guest cart storage after migration"
            );
        }
    }

    fn credit_or_zero(&self, credit: Money) -> Money {
        if credit.currency == self.currency {
            credit.floor_zero()
        } else {
            Money::zero(self.currency)
        }
    }
}
