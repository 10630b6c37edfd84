//! Entries that cannot be normalized are dropped, not fatal.
//!
//! GREEN when:
//! - A snapshot with missing fields, a blank author, or a negative timestamp
//!   keeps every valid entry and reports each dropped one.
//! - A malformed pushed entry is ignored and the feed keeps working.
//! - Contract (`waver`) and feed (`from`) field names normalize to the same
//!   entry.

use std::io::Write;
use std::sync::Arc;

use tokio_stream::StreamExt;
use wvp_ledger_paper::PaperSession;
use wvp_reconcile::is_well_formed;
use wvp_runtime::{ClientEvent, ClientOptions, WaveClient};
use wvp_schemas::{MalformedEntry, RawEntry};
use wvp_testkit::{load_entries_json, raw, settle, ScriptedLedger};

const SNAPSHOT: &str = r#"[
  {"waver": "0xaaa", "timestamp": 100, "message": "ok"},
  {"waver": "0xbbb", "message": "no time"},
  {"waver": "   ", "timestamp": 5, "message": "blank author"},
  {"waver": "0xccc", "timestamp": -1, "message": "before epoch"},
  {"timestamp": 7, "message": "no author"},
  {"waver": "0xddd", "timestamp": 200}
]"#;

#[tokio::test]
async fn malformed_rows_are_dropped_and_reported() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(SNAPSHOT.as_bytes()).unwrap();
    let entries = load_entries_json(f.path().to_str().unwrap()).unwrap();
    assert_eq!(entries.len(), 6);

    let ledger = Arc::new(ScriptedLedger::with_entries(entries));
    let client = WaveClient::new(
        ledger.clone(),
        Arc::new(PaperSession::new("0xme")),
        ClientOptions::default(),
    );
    let report = client.start().await.unwrap();

    assert_eq!(report.kept, 1);
    assert_eq!(report.malformed.len(), 5);
    assert!(report.malformed.contains(&MalformedEntry::EmptyAuthor));
    assert!(report.malformed.contains(&MalformedEntry::NegativeTimestamp(-1)));
    assert!(report.malformed.contains(&MalformedEntry::MissingField("message")));

    let mut events = client.events();
    ledger.emit(RawEntry::default());
    ledger.emit(raw("0xeee", 300, "after garbage"));
    settle().await;

    assert_eq!(client.total_waves(), 2);
    assert!(is_well_formed(&client.view()));
    let inserted = loop {
        match events.next().await {
            Some(ev @ ClientEvent::EntryInserted { .. }) => break ev,
            Some(_) => continue,
            None => panic!("event stream ended"),
        }
    };
    assert!(matches!(inserted, ClientEvent::EntryInserted { index: 0, .. }));
}

#[test]
fn contract_and_feed_shapes_normalize_alike() {
    let from_fetch: RawEntry =
        serde_json::from_str(r#"{"waver":"0xa","timestamp":5,"message":"gm"}"#).unwrap();
    let from_feed: RawEntry =
        serde_json::from_str(r#"{"from":"0xa","timestamp":5,"message":"gm"}"#).unwrap();

    let mut r = wvp_reconcile::LogReconciler::new();
    r.replace_all(vec![from_fetch]);
    assert_eq!(r.apply_incoming(from_feed), wvp_reconcile::ViewChange::Duplicate);
}

