use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use wvp_schemas::{Entry, RawEntry};

use crate::{LogView, ReplaceReport, ViewChange};

/// Total order of the view: timestamp descending, then author, then message.
///
/// Ties on timestamp are broken by content rather than arrival order, so the
/// final view does not depend on whether an entry came in by snapshot or push.
pub fn view_order(a: &Entry, b: &Entry) -> Ordering {
    b.timestamp()
        .cmp(&a.timestamp())
        .then_with(|| a.author().cmp(b.author()))
        .then_with(|| a.message().cmp(b.message()))
}

/// Checks the two view invariants: sorted by [`view_order`] and no duplicates.
pub fn is_well_formed(view: &LogView) -> bool {
    // Strictly increasing under a total order implies no duplicates.
    view.entries()
        .windows(2)
        .all(|w| view_order(&w[0], &w[1]) == Ordering::Less)
}

/// Owner of the canonical [`LogView`].
///
/// The view is only ever replaced wholesale or extended by one ordered insert.
#[derive(Debug, Default)]
pub struct LogReconciler {
    view: LogView,
    keys: HashSet<Entry>,
}

impl LogReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Never mutated after it is returned.
    pub fn view(&self) -> LogView {
        self.view.clone()
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Replace the view with a full ledger snapshot.
    ///
    /// Malformed entries are dropped with a warning. Duplicates within the
    /// batch collapse to one. Source order is irrelevant.
    pub fn replace_all<I>(&mut self, entries: I) -> ViewChange
    where
        I: IntoIterator<Item = RawEntry>,
    {
        let mut report = ReplaceReport::default();
        let mut keys: HashSet<Entry> = HashSet::new();
        let mut next: Vec<Entry> = Vec::new();

        for raw in entries {
            match Entry::from_raw(raw) {
                Ok(entry) => {
                    if keys.insert(entry.clone()) {
                        next.push(entry);
                    } else {
                        report.duplicates += 1;
                    }
                }
                Err(reason) => {
                    warn!(%reason, "dropping malformed entry from snapshot");
                    report.malformed.push(reason);
                }
            }
        }

        next.sort_by(view_order);
        report.kept = next.len();

        debug!(
            kept = report.kept,
            duplicates = report.duplicates,
            dropped = report.malformed.len(),
            "log view replaced"
        );

        self.view = LogView {
            entries: Arc::new(next),
        };
        self.keys = keys;

        ViewChange::Replaced(report)
    }

    /// Merge one pushed entry.
    ///
    /// Idempotent: an entry already in the view is a no-op. Otherwise it is
    /// inserted at its ordered position.
    pub fn apply_incoming(&mut self, raw: RawEntry) -> ViewChange {
        let entry = match Entry::from_raw(raw) {
            Ok(entry) => entry,
            Err(reason) => {
                warn!(%reason, "dropping malformed entry from feed");
                return ViewChange::Dropped(reason);
            }
        };

        if self.keys.contains(&entry) {
            debug!(
                author = entry.author(),
                timestamp = entry.timestamp(),
                "duplicate entry ignored"
            );
            return ViewChange::Duplicate;
        }

        let index = self
            .view
            .entries
            .partition_point(|e| view_order(e, &entry) == Ordering::Less);

        // Copy-on-write: snapshots already handed out keep their contents.
        Arc::make_mut(&mut self.view.entries).insert(index, entry.clone());
        self.keys.insert(entry.clone());

        debug!(
            author = entry.author(),
            timestamp = entry.timestamp(),
            index,
            "entry inserted"
        );

        ViewChange::Inserted { index, entry }
    }
}
