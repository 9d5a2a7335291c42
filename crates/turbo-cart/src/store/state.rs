//! Mutable state owned by a [`CartStore`](super::CartStore).

use crate::cart::{Cart, LineKey};
use crate::credit::PromotionalCredit;
use crate::error::CartError;
use crate::ids::UserId;
use crate::store::sync::LineSync;
use std::collections::HashMap;

/// Who the cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Session {
    Guest,
    Authenticated(UserId),
}

impl Session {
    pub(crate) fn user(&self) -> Option<&UserId> {
        match self {
            Session::Guest => None,
            Session::Authenticated(user) => Some(user),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CartState {
    pub(crate) session: Session,
    pub(crate) cart: Cart,
    /// Remote sync state per key. Empty for guests.
    pub(crate) sync: HashMap<LineKey, LineSync>,
    pub(crate) credit: Option<PromotionalCredit>,
    pub(crate) apply_credit: bool,
    next_version: u64,
    /// Bumped on every change to `cart`.
    pub(crate) generation: u64,
    /// Bumped on every login and logout.
    pub(crate) session_epoch: u64,
    pub(crate) last_error: Option<CartError>,
}

impl CartState {
    pub(crate) fn guest(cart: Cart, apply_credit: bool) -> Self {
        Self {
            session: Session::Guest,
            cart,
            sync: HashMap::new(),
            credit: None,
            apply_credit,
            next_version: 0,
            generation: 0,
            session_epoch: 0,
            last_error: None,
        }
    }

    pub(crate) fn next_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    pub(crate) fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn is_pending(&self, key: &LineKey) -> bool {
        self.sync.get(key).is_some_and(LineSync::is_pending)
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.sync.values().filter(|s| s.is_pending()).count()
    }

    /// Whether the server holds a line for `key`, as far as we know.
    pub(crate) fn exists_remotely(&self, key: &LineKey) -> bool {
        self.sync.get(key).is_some_and(LineSync::exists_remotely)
    }

    /// Forget sync state for a key that is idle and absent on the server.
    pub(crate) fn prune_sync(&mut self, key: &LineKey) {
        if self
            .sync
            .get(key)
            .is_some_and(|s| !s.is_pending() && !s.exists_remotely())
        {
            self.sync.remove(key);
        }
    }

    /// Switch to `user` with `cart` as the server-confirmed contents.
    pub(crate) fn authenticate(&mut self, user: UserId, cart: Cart) {
        self.sync = cart
            .lines()
            .map(|line| (line.key.clone(), LineSync::confirmed(line.clone())))
            .collect();
        self.session = Session::Authenticated(user);
        self.cart = cart;
        self.credit = None;
        self.session_epoch += 1;
        self.touch();
    }

    /// Drop back to a guest session holding `cart`.
    pub(crate) fn become_guest(&mut self, cart: Cart) {
        self.session = Session::Guest;
        self.cart = cart;
        self.sync.clear();
        self.credit = None;
        self.session_epoch += 1;
        self.touch();
    }
}
