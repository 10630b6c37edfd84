//! Refresh and feed may race; the outcome does not depend on arrival order.
//!
//! GREEN when:
//! - For a snapshot S and e in S, replace-then-push and push-then-replace give
//!   the same view.
//! - Permuted pushes of the same entries give the same view.
//! - An entry pushed while a fetch is in flight survives the replace that the
//!   stale fetch triggers.

use std::sync::Arc;

use wvp_ledger_paper::PaperSession;
use wvp_reconcile::{is_well_formed, LogReconciler};
use wvp_runtime::{ClientOptions, WaveClient};
use wvp_testkit::{raw, settle, ScriptedLedger};
use wvp_schemas::RawEntry;

fn snapshot() -> Vec<RawEntry> {
    vec![
        raw("a", 100, "hi"),
        raw("b", 200, "yo"),
        raw("c", 200, "same second"),
        raw("d", 50, ""),
    ]
}

#[test]
fn replace_and_push_commute() {
    for e in snapshot() {
        let mut first = LogReconciler::new();
        first.replace_all(snapshot());
        first.apply_incoming(e.clone());

        let mut second = LogReconciler::new();
        second.apply_incoming(e);
        second.replace_all(snapshot());

        assert_eq!(first.view(), second.view());
    }
}

#[test]
fn push_order_does_not_matter() {
    let entries = snapshot();
    let mut forward = LogReconciler::new();
    for e in entries.iter().cloned() {
        forward.apply_incoming(e);
    }
    let mut backward = LogReconciler::new();
    for e in entries.iter().rev().cloned() {
        backward.apply_incoming(e);
    }

    let mut batch = LogReconciler::new();
    batch.replace_all(entries);

    assert_eq!(forward.view(), backward.view());
    assert_eq!(forward.view(), batch.view());
    assert!(is_well_formed(&forward.view()));
}

#[tokio::test]
async fn push_during_stale_fetch_is_kept() {
    let ledger = Arc::new(ScriptedLedger::with_entries([raw("a", 100, "hi")]));
    let client = Arc::new(WaveClient::new(
        ledger.clone(),
        Arc::new(PaperSession::new("0xme")),
        ClientOptions::default(),
    ));
    client.start().await.unwrap();

    ledger.pause_fetches();
    let c = Arc::clone(&client);
    let refresh = tokio::spawn(async move { c.refresh().await });
    ledger.wait_for_fetches(2).await;

    // Written after the in-flight snapshot was taken.
    ledger.store(raw("z", 300, "late"));
    ledger.emit(raw("z", 300, "late"));
    ledger.resume_fetches();

    refresh.await.unwrap().unwrap();
    settle().await;

    let view = client.view();
    assert_eq!(view.len(), 2);
    assert_eq!(view.latest().unwrap().author(), "z");

    // The next clean refresh agrees.
    client.refresh().await.unwrap();
    assert_eq!(client.view(), view);
}
