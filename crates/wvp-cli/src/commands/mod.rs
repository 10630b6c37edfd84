//! Command handlers for `wvp`.
//!
//! Every command except `config-hash` runs against a fresh paper ledger,
//! optionally seeded from a JSON snapshot, through the same `WaveClient` a real
//! ledger binding would use.

pub mod log;
pub mod watch;
pub mod wave;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use wvp_config::{report_unused_keys, ClientConfig, UnusedKeyPolicy};
use wvp_ledger_paper::{PaperConfig, PaperLedger, PaperSession};
use wvp_runtime::{ClientError, ClientOptions, WaveClient};

pub struct PaperClientSession {
    pub ledger: PaperLedger,
    pub client: WaveClient,
}

impl PaperClientSession {
    /// Move the paper clock to wall-clock time.
    pub fn sync_clock(&self) {
        self.ledger.set_time(Utc::now().timestamp());
    }
}

/// Load config, start logging, and build the paper-backed client.
pub fn open_session(
    config_paths: &[String],
    seed: Option<&str>,
    account: &str,
    init_tracing: fn(&str),
) -> Result<PaperClientSession> {
    let (cfg, unused) = load_client_config(config_paths)?;
    init_tracing(&cfg.log_filter);
    if !cfg.contract_address.is_empty() {
        tracing::info!(
            contract_address = %cfg.contract_address,
            "configured contract (paper ledger stands in for it)"
        );
    }
    for leaf in &unused {
        tracing::warn!(leaf = %leaf, "config key is not read by the client");
    }

    let ledger = PaperLedger::new(PaperConfig {
        cooldown_secs: i64::try_from(cfg.paper.cooldown_secs)
            .context("paper.cooldown_secs out of range")?,
        auto_mine: cfg.paper.auto_mine,
        redeliver: cfg.paper.redeliver,
    });
    if let Some(path) = seed {
        let raw = fs::read_to_string(path).with_context(|| format!("read seed failed: {path}"))?;
        let n = ledger
            .seed_json(&raw)
            .context("seed must be a JSON array of {author, timestamp, message} objects")?;
        tracing::info!(entries = n, path, "paper ledger seeded");
    }

    let defaults = ClientOptions::default();
    let client = WaveClient::new(
        Arc::new(ledger.clone()),
        Arc::new(PaperSession::new(account)),
        ClientOptions {
            gas_limit: cfg.gas_limit.unwrap_or(defaults.gas_limit),
            fetch_timeout: cfg.fetch_timeout,
            submit_timeout: cfg.submit_timeout,
        },
    );
    let session = PaperClientSession { ledger, client };
    session.sync_clock();
    Ok(session)
}

/// Effective config plus the leaves nothing reads. No paths = defaults.
fn load_client_config(paths: &[String]) -> Result<(ClientConfig, Vec<String>)> {
    if paths.is_empty() {
        return Ok((ClientConfig::default(), Vec::new()));
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = wvp_config::load_layered_yaml(&path_refs)?;
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    let cfg = loaded.client().context("invalid client config")?;
    Ok((cfg, report.unused_leaf_pointers))
}

/// Attach the user-facing hint to a client error.
pub fn explain(e: ClientError) -> anyhow::Error {
    anyhow::anyhow!("{} ({e})", e.hint().message())
}
