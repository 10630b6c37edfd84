//! Shared, observable log view.
//!
//! [`SharedLog`] is the only owner of the [`LogReconciler`]. Both input
//! channels (full refresh and live feed) go through it, and every visible
//! change is published on the [`ClientBus`].
//!
//! # Refresh race
//!
//! A fetch is a suspension point. An entry pushed while a fetch is in flight
//! may be newer than the snapshot the fetch returns, and a wholesale replace
//! would erase it. Entries pushed during a fetch are therefore remembered and
//! merged again on top of the snapshot. The merge is idempotent, so entries the
//! snapshot already contains are no-ops.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use wvp_execution::{LedgerClient, LedgerError};
use wvp_reconcile::{LogReconciler, LogView, ReplaceReport, ViewChange};
use wvp_schemas::RawEntry;

use crate::state::{ClientBus, ClientEvent};

#[derive(Debug, Default)]
struct Inner {
    reconciler: LogReconciler,
    /// Number of fetches currently in flight.
    refreshing: usize,
    /// Entries pushed while `refreshing > 0`.
    late: Vec<RawEntry>,
}

/// Cloneable handle to the single reconciled view.
#[derive(Clone, Debug)]
pub struct SharedLog {
    inner: Arc<Mutex<Inner>>,
    bus: ClientBus,
}

impl SharedLog {
    pub fn new(bus: ClientBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            bus,
        }
    }

    /// Immutable snapshot of the current view.
    pub fn view(&self) -> LogView {
        self.lock().reconciler.view()
    }

    pub fn len(&self) -> usize {
        self.lock().reconciler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().reconciler.is_empty()
    }

    /// Replace the view with a full snapshot.
    pub fn replace_all(&self, entries: Vec<RawEntry>) -> ReplaceReport {
        let (change, replayed) = {
            let mut inner = self.lock();
            let change = inner.reconciler.replace_all(entries);
            let late = inner.late.clone();
            let replayed: Vec<ViewChange> = late
                .into_iter()
                .map(|raw| inner.reconciler.apply_incoming(raw))
                .filter(ViewChange::is_visible)
                .collect();
            (change, replayed)
        };

        self.notify(&change);
        for c in &replayed {
            self.notify(c);
        }

        match change {
            ViewChange::Replaced(report) => report,
            _ => ReplaceReport::default(),
        }
    }

    /// Merge one entry from the live feed.
    pub fn apply_incoming(&self, raw: RawEntry) -> ViewChange {
        let change = {
            let mut inner = self.lock();
            if inner.refreshing > 0 {
                inner.late.push(raw.clone());
            }
            inner.reconciler.apply_incoming(raw)
        };
        self.notify(&change);
        change
    }

    /// Fetch the full ledger and replace the view.
    ///
    /// # Errors
    /// On a fetch failure the previous view is kept, a
    /// [`ClientEvent::RefreshFailed`] is published, and the error is returned.
    pub async fn refresh(&self, ledger: &dyn LedgerClient) -> Result<ReplaceReport, LedgerError> {
        let _guard = RefreshGuard::enter(self);

        match ledger.fetch_all().await {
            Ok(entries) => {
                let report = self.replace_all(entries);
                info!(
                    ledger = ledger.name(),
                    kept = report.kept,
                    dropped = report.malformed.len(),
                    "log refreshed"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(ledger = ledger.name(), error = %e, "refresh failed; keeping previous view");
                self.bus.publish(ClientEvent::RefreshFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn notify(&self, change: &ViewChange) {
        if let Some(ev) = ClientEvent::from_view_change(change) {
            self.bus.publish(ev);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a fetch in flight for its whole lifetime, including cancellation.
struct RefreshGuard<'a> {
    log: &'a SharedLog,
}

impl<'a> RefreshGuard<'a> {
    fn enter(log: &'a SharedLog) -> Self {
        log.lock().refreshing += 1;
        Self { log }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.log.lock();
        inner.refreshing = inner.refreshing.saturating_sub(1);
        if inner.refreshing == 0 {
            inner.late.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(a: &str, ts: i64, m: &str) -> RawEntry {
        RawEntry::new(a, ts, m)
    }

    #[test]
    fn incoming_publishes_insert_but_not_duplicate() {
        let bus = ClientBus::new();
        let mut rx = bus.subscribe();
        let log = SharedLog::new(bus);

        log.apply_incoming(raw("a", 1, "x"));
        log.apply_incoming(raw("a", 1, "x"));

        assert!(matches!(
            rx.try_recv().unwrap(),
            ClientEvent::EntryInserted { index: 0, .. }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn replace_publishes_summary() {
        let bus = ClientBus::new();
        let mut rx = bus.subscribe();
        let log = SharedLog::new(bus);

        let report = log.replace_all(vec![raw("a", 1, "x"), raw("a", 1, "x"), RawEntry::default()]);
        assert_eq!(report.kept, 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::ViewReplaced {
                len: 1,
                duplicates: 1,
                dropped: 1
            }
        );
    }

    #[test]
    fn entries_pushed_during_refresh_survive_replace() {
        let log = SharedLog::new(ClientBus::new());
        let guard = RefreshGuard::enter(&log);

        // Arrives after the ledger produced its snapshot.
        log.apply_incoming(raw("late", 50, "new"));
        log.replace_all(vec![raw("a", 10, "old")]);
        drop(guard);

        let view = log.view();
        assert_eq!(view.len(), 2);
        assert_eq!(view.latest().unwrap().author(), "late");
        assert!(log.lock().late.is_empty());
    }

    #[test]
    fn pushes_outside_refresh_are_not_remembered() {
        let log = SharedLog::new(ClientBus::new());
        log.apply_incoming(raw("a", 1, "x"));
        assert!(log.lock().late.is_empty());
        // Not in the snapshot and not late: replaced away.
        log.replace_all(vec![raw("b", 2, "y")]);
        assert_eq!(log.len(), 1);
    }
}
