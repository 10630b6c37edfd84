use anyhow::{Context, Result};
use wvp_schemas::Entry;

use super::{explain, PaperClientSession};

pub async fn run(session: &PaperClientSession, json: bool) -> Result<()> {
    let client = &session.client;
    client.start().await.map_err(explain)?;
    let view = client.view();
    client.stop();

    if json {
        let entries: Vec<&Entry> = view.iter().collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("serialize view failed")?
        );
        return Ok(());
    }

    for entry in &view {
        println!("{}", render(entry));
    }
    println!("total_waves={}", view.len());
    Ok(())
}

/// `<rfc3339 time>  <author>  <message>`; the raw timestamp stands in when it
/// is out of range for a calendar date.
pub fn render(entry: &Entry) -> String {
    let when = entry
        .time()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| entry.timestamp().to_string());
    format!("{when}  {}  {}", entry.author(), entry.display_message())
}
