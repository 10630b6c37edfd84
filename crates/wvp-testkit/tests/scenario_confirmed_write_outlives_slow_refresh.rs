//! A confirmed write is reported as confirmed, however long the refetch takes.
//!
//! GREEN when:
//! - With a submit bound shorter than the post-confirmation refetch, `wave`
//!   still returns the receipt once the refetch completes.
//! - When the refetch itself times out, `wave` still succeeds, the previous
//!   view is kept, and the refresh failure is published on the bus.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use wvp_ledger_paper::PaperSession;
use wvp_runtime::{ClientEvent, ClientOptions, WaveClient};
use wvp_testkit::{raw, ScriptedLedger};

fn client_with(ledger: &Arc<ScriptedLedger>, opts: ClientOptions) -> Arc<WaveClient> {
    Arc::new(WaveClient::new(
        ledger.clone(),
        Arc::new(PaperSession::connected("0xme")),
        opts,
    ))
}

#[tokio::test]
async fn submit_bound_stops_at_confirmation() {
    let ledger = Arc::new(ScriptedLedger::with_entries([raw("a", 100, "hi")]));
    let client = client_with(
        &ledger,
        ClientOptions {
            submit_timeout: Some(Duration::from_millis(100)),
            ..ClientOptions::default()
        },
    );
    client.start().await.unwrap();
    let mut events = client.events();

    ledger.pause_fetches();
    let c = Arc::clone(&client);
    let wave = tokio::spawn(async move { c.wave("slow view").await });
    ledger.wait_for_appends(1).await;
    ledger.accept("0xabc");
    ledger.include(200);

    ledger.wait_for_fetches(2).await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    ledger.resume_fetches();

    let receipt = wave.await.unwrap().unwrap();
    assert_eq!(receipt.tx_hash.as_deref(), Some("0xabc"));
    assert_eq!(client.total_waves(), 2);
    assert_eq!(client.view().latest().unwrap().message(), "slow view");

    let mut states = Vec::new();
    while let Some(ev) = events.next().await {
        if let ClientEvent::Tx { state, .. } = ev {
            let done = state == "idle";
            states.push(state);
            if done {
                break;
            }
        }
    }
    assert_eq!(states, vec!["pending", "mining", "confirmed", "idle"]);
}

#[tokio::test]
async fn refetch_timeout_after_confirmation_is_not_a_write_failure() {
    let ledger = Arc::new(ScriptedLedger::with_entries([raw("a", 100, "hi")]));
    let client = client_with(
        &ledger,
        ClientOptions {
            fetch_timeout: Some(Duration::from_millis(50)),
            submit_timeout: Some(Duration::from_millis(50)),
            ..ClientOptions::default()
        },
    );
    client.start().await.unwrap();
    let mut events = client.events();

    ledger.pause_fetches();
    let c = Arc::clone(&client);
    let wave = tokio::spawn(async move { c.wave("never refetched").await });
    ledger.wait_for_appends(1).await;
    ledger.accept("0xdef");
    ledger.include(200);

    let receipt = wave.await.unwrap().unwrap();
    assert_eq!(receipt.tx_hash.as_deref(), Some("0xdef"));
    assert_eq!(client.total_waves(), 1);

    // The view and write-path buses are merged, so the two may arrive in
    // either order.
    let (mut refresh_failed, mut idle) = (false, false);
    while !(refresh_failed && idle) {
        match events.next().await {
            Some(ClientEvent::RefreshFailed { reason }) => {
                assert_eq!(reason, "refresh timed out after 50ms");
                refresh_failed = true;
            }
            Some(ClientEvent::Tx { state, .. }) => {
                assert_ne!(state, "failed");
                idle |= state == "idle";
            }
            Some(_) => {}
            None => break,
        }
    }
    assert!(refresh_failed && idle);
    ledger.resume_fetches();
}
