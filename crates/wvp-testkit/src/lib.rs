//! Test support for the wave client: a scripted ledger and fixtures.
//!
//! End-to-end scenarios live under `tests/`.

use anyhow::{Context, Result};
use std::fs;
use wvp_schemas::RawEntry;

mod scripted;

pub use scripted::{AppendCall, ScriptedLedger};

pub fn raw(author: &str, timestamp: i64, message: &str) -> RawEntry {
    RawEntry::new(author, timestamp, message)
}

/// `[{a,100,"hi"}, {b,200,"yo"}]`, deliberately oldest first.
pub fn two_wave_snapshot() -> Vec<RawEntry> {
    vec![raw("a", 100, "hi"), raw("b", 200, "yo")]
}

/// Load a JSON array of entries (contract or feed field names).
pub fn load_entries_json(path: &str) -> Result<Vec<RawEntry>> {
    let s = fs::read_to_string(path).with_context(|| format!("read entries: {path}"))?;
    let entries: Vec<RawEntry> = serde_json::from_str(&s).context("parse entries json")?;
    Ok(entries)
}

/// Let spawned tasks and pending callbacks run.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
