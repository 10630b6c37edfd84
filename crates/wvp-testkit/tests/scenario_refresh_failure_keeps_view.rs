//! A failing read path never corrupts the view.
//!
//! GREEN when:
//! - A failed fetch returns a refresh error (try-later hint), publishes
//!   `RefreshFailed`, and keeps the previous view.
//! - A fetch that exceeds the caller's bound times out the same way and a late
//!   response does not clobber the view.
//! - The live feed keeps merging while fetches fail.
//! - A failed post-confirmation refetch does not fail the confirmed write.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use wvp_execution::{LedgerError, UserHint};
use wvp_ledger_paper::PaperSession;
use wvp_runtime::{ClientError, ClientEvent, ClientOptions, WaveClient};
use wvp_testkit::{raw, settle, two_wave_snapshot, ScriptedLedger};

#[tokio::test]
async fn failed_fetch_keeps_previous_view() {
    let ledger = Arc::new(ScriptedLedger::with_entries(two_wave_snapshot()));
    let client = WaveClient::new(
        ledger.clone(),
        Arc::new(PaperSession::new("0xme")),
        ClientOptions::default(),
    );
    client.start().await.unwrap();
    let before = client.view();
    let mut events = client.events();

    ledger.fail_fetches(Some(LedgerError::Network("rpc unreachable".into())));
    let err = client.refresh().await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Refresh(LedgerError::Network("rpc unreachable".into()))
    );
    assert_eq!(err.hint(), UserHint::TryLater);
    assert_eq!(client.view(), before);

    match events.next().await {
        Some(ClientEvent::RefreshFailed { reason }) => {
            assert_eq!(reason, "network error: rpc unreachable")
        }
        other => panic!("expected RefreshFailed, got {other:?}"),
    }

    ledger.emit(raw("c", 300, "still live"));
    settle().await;
    assert_eq!(client.total_waves(), 3);
}

#[tokio::test]
async fn slow_fetch_times_out_without_touching_view() {
    let ledger = Arc::new(ScriptedLedger::with_entries(two_wave_snapshot()));
    let client = WaveClient::new(
        ledger.clone(),
        Arc::new(PaperSession::new("0xme")),
        ClientOptions {
            fetch_timeout: Some(Duration::from_millis(20)),
            ..ClientOptions::default()
        },
    );
    client.start().await.unwrap();

    ledger.store(raw("z", 999, "not yet"));
    ledger.pause_fetches();
    let err = client.refresh().await.unwrap_err();
    assert!(matches!(err, ClientError::TimedOut(t) if t.op == "refresh"));
    assert_eq!(client.total_waves(), 2);

    ledger.resume_fetches();
    client.refresh().await.unwrap();
    assert_eq!(client.total_waves(), 3);
}

#[tokio::test]
async fn failed_refetch_after_confirm_still_confirms() {
    let ledger = Arc::new(ScriptedLedger::new());
    let client = Arc::new(WaveClient::new(
        ledger.clone(),
        Arc::new(PaperSession::connected("0xme")),
        ClientOptions::default(),
    ));
    client.start().await.unwrap();
    ledger.fail_fetches(Some(LedgerError::Contract("bad return data".into())));

    let c = Arc::clone(&client);
    let wave = tokio::spawn(async move { c.wave("hello").await });
    ledger.wait_for_appends(1).await;
    ledger.accept("0x1");
    ledger.include(10);
    assert!(wave.await.unwrap().is_ok());

    // Not visible until the feed or a later refresh brings it in.
    assert_eq!(client.total_waves(), 0);
    ledger.emit(raw("0xme", 10, "hello"));
    settle().await;
    assert_eq!(client.total_waves(), 1);
}
