use std::time::Duration;

use anyhow::{Context, Result};
use tokio_stream::StreamExt;
use tracing::warn;

use super::{explain, PaperClientSession};

/// Print every client event as one JSON line until `duration` elapses.
///
/// Events produced while submitting `waves` are buffered by the bus and
/// printed afterwards.
pub async fn run(session: &PaperClientSession, waves: &[String], duration: Duration) -> Result<()> {
    let client = &session.client;
    let mut events = client.events();

    if waves.is_empty() {
        client.start().await.map_err(explain)?;
    } else {
        client.connect().await.map_err(explain)?;
    }

    for message in waves {
        session.sync_clock();
        if let Err(e) = client.wave(message).await {
            warn!(error = %e, hint = e.hint().message(), "wave failed");
        }
    }

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            ev = events.next() => match ev {
                Some(ev) => println!("{}", serde_json::to_string(&ev).context("serialize event failed")?),
                None => break,
            },
        }
    }

    client.stop();
    Ok(())
}
