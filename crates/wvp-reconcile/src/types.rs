use std::sync::Arc;

use wvp_schemas::{Entry, MalformedEntry};

/// Immutable snapshot of the reconciled log, most recent first.
///
/// Cloning is cheap (shared). A snapshot handed to an observer never changes;
/// the reconciler copies on write when it still has readers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogView {
    pub(crate) entries: Arc<Vec<Entry>>,
}

impl LogView {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &Entry) -> bool {
        self.entries.contains(entry)
    }

    /// Most recent entry, if any.
    pub fn latest(&self) -> Option<&Entry> {
        self.entries.first()
    }
}

impl<'a> IntoIterator for &'a LogView {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// What a full replace did to its input batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Entries in the new view.
    pub kept: usize,
    /// Input entries dropped because an equal entry came earlier in the batch.
    pub duplicates: usize,
    /// Input entries dropped because they could not be normalized.
    pub malformed: Vec<MalformedEntry>,
}

/// The change an operation made to the view. Observers are notified with this.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewChange {
    /// The view was replaced wholesale.
    Replaced(ReplaceReport),
    /// One entry was inserted at `index`.
    Inserted { index: usize, entry: Entry },
    /// The pushed entry was already present; no-op.
    Duplicate,
    /// The pushed entry could not be normalized; dropped.
    Dropped(MalformedEntry),
}

impl ViewChange {
    /// `true` if the visible view changed.
    pub fn is_visible(&self) -> bool {
        matches!(self, ViewChange::Replaced(_) | ViewChange::Inserted { .. })
    }
}
