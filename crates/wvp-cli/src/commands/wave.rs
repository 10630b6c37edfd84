use anyhow::Result;

use super::{explain, log::render, PaperClientSession};

pub async fn run(session: &PaperClientSession, message: &str) -> Result<()> {
    let client = &session.client;
    let identity = client.connect().await.map_err(explain)?;

    session.sync_clock();
    let receipt = client.wave(message).await.map_err(explain)?;
    client.stop();

    println!(
        "confirmed tx_id={} tx_hash={} author={identity}",
        receipt.tx_id,
        receipt.tx_hash.as_deref().unwrap_or("-"),
    );
    if let Some(latest) = client.view().latest() {
        println!("{}", render(latest));
    }
    println!("total_waves={}", client.total_waves());
    Ok(())
}
