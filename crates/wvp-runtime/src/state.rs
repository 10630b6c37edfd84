//! Observer bus for the client.
//!
//! Observers never touch the log view or the transaction slot; they get
//! change notifications here and read snapshots through the owners.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;
use wvp_execution::{TxState, TxUpdate};
use wvp_reconcile::ViewChange;
use wvp_schemas::Entry;

const BUS_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Messages broadcast to observers of a [`crate::WaveClient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The view was rebuilt from a full fetch.
    ViewReplaced {
        len: usize,
        duplicates: usize,
        dropped: usize,
    },
    /// One pushed entry was merged.
    EntryInserted { index: usize, entry: Entry },
    /// A full fetch failed; the previous view is still current.
    RefreshFailed { reason: String },
    /// The live feed was opened or closed.
    Feed { active: bool },
    /// Opening the live feed failed; no feed is active.
    FeedFailed { reason: String },
    /// The write path changed state.
    Tx {
        tx_id: Uuid,
        state: String,
        tx_hash: Option<String>,
        reason: Option<String>,
    },
}

impl ClientEvent {
    /// Notification for a view change, or `None` if nothing visible changed.
    pub fn from_view_change(change: &ViewChange) -> Option<Self> {
        match change {
            ViewChange::Replaced(report) => Some(ClientEvent::ViewReplaced {
                len: report.kept,
                duplicates: report.duplicates,
                dropped: report.malformed.len(),
            }),
            ViewChange::Inserted { index, entry } => Some(ClientEvent::EntryInserted {
                index: *index,
                entry: entry.clone(),
            }),
            ViewChange::Duplicate | ViewChange::Dropped(_) => None,
        }
    }
}

impl From<TxUpdate> for ClientEvent {
    fn from(u: TxUpdate) -> Self {
        let reason = match &u.state {
            TxState::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        ClientEvent::Tx {
            tx_id: u.tx_id,
            state: u.state.label().to_string(),
            tx_hash: u.tx_hash,
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientBus
// ---------------------------------------------------------------------------

/// Cloneable broadcast handle for [`ClientEvent`]s.
#[derive(Clone, Debug)]
pub struct ClientBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl Default for ClientBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, ev: ClientEvent) {
        let _ = self.tx.send(ev);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wvp_reconcile::ReplaceReport;

    #[test]
    fn duplicate_and_dropped_changes_are_silent() {
        assert_eq!(ClientEvent::from_view_change(&ViewChange::Duplicate), None);
        assert!(ClientEvent::from_view_change(&ViewChange::Replaced(ReplaceReport::default()))
            .is_some());
    }

    #[test]
    fn failed_tx_update_carries_reason() {
        let ev = ClientEvent::from(TxUpdate {
            tx_id: Uuid::nil(),
            state: TxState::Failed("rate limited".into()),
            tx_hash: None,
        });
        match ev {
            ClientEvent::Tx { state, reason, .. } => {
                assert_eq!(state, "failed");
                assert_eq!(reason.as_deref(), Some("rate limited"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&ClientEvent::Feed { active: true }).unwrap();
        assert_eq!(json, r#"{"type":"feed","active":true}"#);

        let json = serde_json::to_string(&ClientEvent::FeedFailed {
            reason: "ws down".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"feed_failed","reason":"ws down"}"#);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = ClientBus::new();
        bus.publish(ClientEvent::Feed { active: false });
        let mut rx = bus.subscribe();
        bus.publish(ClientEvent::Feed { active: true });
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Feed { active: true });
    }
}
