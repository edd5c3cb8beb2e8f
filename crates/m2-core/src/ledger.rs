//! Reference-counted subscription ledger.
//!
//! Subscriptions are counted per owning message id, not per signal: several
//! signals can share one message, and the message stays enabled while any of
//! them is subscribed. Only the 0 -> 1 and 1 -> 0 transitions are reported so
//! the caller issues exactly one enable and one disable per cycle.

use std::collections::HashMap;

/// Message id -> number of live signal subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionLedger {
    refs: HashMap<u16, u32>,
}

impl SubscriptionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reference. Returns `true` on the 0 -> 1 transition.
    pub fn acquire(&mut self, message_id: u16) -> bool {
        let count = self.refs.entry(message_id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop one reference. Returns `true` on the 1 -> 0 transition.
    ///
    /// Releasing an unreferenced message is a no-op and returns `false`.
    pub fn release(&mut self, message_id: u16) -> bool {
        match self.refs.get_mut(&message_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                let _ = self.refs.remove(&message_id);
                true
            }
            None => false,
        }
    }

    /// Current reference count for a message.
    pub fn count(&self, message_id: u16) -> u32 {
        self.refs.get(&message_id).copied().unwrap_or(0)
    }

    /// Number of messages with at least one reference.
    pub fn active_messages(&self) -> usize {
        self.refs.len()
    }

    /// Forget every reference.
    pub fn clear(&mut self) {
        self.refs.clear();
    }
}
