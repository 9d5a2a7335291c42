//! Per-key send order for remote writes.
//!
//! A mutation takes a ticket for its key in the same critical section that
//! applies it locally and assigns its version. It then waits for that ticket
//! to be served before talking to the server. Tickets for a key are served
//! strictly in issue order, so the server sees writes in the order the
//! shopper made them, whichever task reaches the await first.

use crate::cart::LineKey;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

struct KeyQueue {
    next_ticket: u64,
    serving: u64,
    /// Tickets released out of order, waiting for `serving` to reach them.
    released: BTreeSet<u64>,
    serving_tx: watch::Sender<u64>,
}

impl KeyQueue {
    fn new() -> Self {
        let (serving_tx, _) = watch::channel(0);
        Self {
            next_ticket: 0,
            serving: 0,
            released: BTreeSet::new(),
            serving_tx,
        }
    }
}

/// Ticket dispenser, one queue per key with writes outstanding.
#[derive(Default)]
pub(crate) struct SendOrder {
    queues: Mutex<HashMap<LineKey, KeyQueue>>,
}

impl SendOrder {
    /// Take the next place in line for `key`.
    pub(crate) fn ticket(&self, key: &LineKey) -> Ticket<'_> {
        let mut queues = self.lock();
        let queue = queues.entry(key.clone()).or_insert_with(KeyQueue::new);
        let number = queue.next_ticket;
        queue.next_ticket += 1;
        Ticket {
            order: self,
            key: key.clone(),
            number,
            serving_rx: queue.serving_tx.subscribe(),
        }
    }

    fn release(&self, key: &LineKey, number: u64) {
        let mut queues = self.lock();
        let Some(queue) = queues.get_mut(key) else {
            return;
        };
        queue.released.insert(number);
        while queue.released.remove(&queue.serving) {
            queue.serving += 1;
        }
        if queue.serving == queue.next_ticket {
            queues.remove(key);
        } else {
            queue.serving_tx.send_replace(queue.serving);
        }
    }

    #[cfg(test)]
    fn queued_keys(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<LineKey, KeyQueue>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A place in a key's queue. Dropping it lets the next ticket through,
/// including when the holder is cancelled before its turn.
pub(crate) struct Ticket<'a> {
    order: &'a SendOrder,
    key: LineKey,
    number: u64,
    serving_rx: watch::Receiver<u64>,
}

impl Ticket<'_> {
    /// Wait until every earlier ticket for the key has been released.
    pub(crate) async fn turn(&mut self) {
        let number = self.number;
        // The sender lives until this ticket is released, so this only
        // returns once the turn has come.
        let _ = self.serving_rx.wait_for(|serving| *serving >= number).await;
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.order.release(&self.key, self.number);
    }
}
