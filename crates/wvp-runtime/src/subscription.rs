//! Live feed subscription management.
//!
//! # Invariants
//!
//! - **Zero or one active subscription** per manager. Opening a new one always
//!   releases the previous one first, so the same event is never delivered
//!   through two listeners.
//! - **Teardown never fails.** `stop` on an idle manager is a no-op, and
//!   dropping the manager releases whatever it holds.
//!
//! The held [`Subscription`] unsubscribes itself when dropped, so releasing it
//! is a matter of taking it out of the slot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use wvp_execution::{EntrySink, LedgerClient, LedgerError, Subscription};

pub struct EventSubscriptionManager {
    ledger: Arc<dyn LedgerClient>,
    active: Mutex<Option<Subscription>>,
}

impl EventSubscriptionManager {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            active: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// Id of the held subscription, if any.
    pub fn active_id(&self) -> Option<u64> {
        self.slot().as_ref().map(Subscription::id)
    }

    /// Open exactly one subscription delivering into `on_entry`.
    ///
    /// A subscription still held from an earlier `start` is torn down before
    /// the new one is opened.
    ///
    /// # Errors
    /// Returns the ledger's error if the subscription cannot be opened; the
    /// manager is then inactive.
    pub async fn start(&self, on_entry: EntrySink) -> Result<(), LedgerError> {
        let prev = self.slot().take();
        if let Some(prev) = prev {
            warn!(
                subscription = prev.id(),
                "start called with an active subscription; releasing it first"
            );
            prev.unsubscribe();
        }

        let sub = self.ledger.subscribe(on_entry).await?;
        info!(ledger = self.ledger.name(), subscription = sub.id(), "feed subscribed");

        // Another start may have completed while we were suspended.
        let displaced = self.slot().replace(sub);
        if let Some(other) = displaced {
            warn!(
                subscription = other.id(),
                "concurrent start displaced a subscription; releasing it"
            );
            other.unsubscribe();
        }
        Ok(())
    }

    /// Release the held subscription, if any.
    pub fn stop(&self) {
        // The ledger's release runs without the slot lock held.
        let held = self.slot().take();
        if let Some(sub) = held {
            info!(subscription = sub.id(), "feed unsubscribed");
            sub.unsubscribe();
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for EventSubscriptionManager {
    fn drop(&mut self) {
        self.stop();
    }
}
