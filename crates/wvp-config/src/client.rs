use std::time::Duration;

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Paper ledger knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperSection {
    pub cooldown_secs: u64,
    pub auto_mine: bool,
    pub redeliver: bool,
}

impl Default for PaperSection {
    fn default() -> Self {
        Self {
            cooldown_secs: 0,
            auto_mine: true,
            redeliver: false,
        }
    }
}

/// Typed view of the effective config. Absent keys take defaults; present
/// keys of the wrong type are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Logged when a session opens; the paper ledger ignores it.
    pub contract_address: String,
    /// `None` = the client's default gas limit.
    pub gas_limit: Option<u64>,
    pub fetch_timeout: Option<Duration>,
    pub submit_timeout: Option<Duration>,
    pub paper: PaperSection,
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            gas_limit: None,
            fetch_timeout: None,
            submit_timeout: None,
            paper: PaperSection::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let d = Self::default();
        let gas_limit = read_u64(v, "/ledger/gas_limit")?;
        if gas_limit == Some(0) {
            bail!("CONFIG_INVALID leaf=/ledger/gas_limit: must be greater than zero");
        }

        Ok(Self {
            contract_address: read_str(v, "/ledger/contract_address")?
                .unwrap_or(d.contract_address),
            gas_limit,
            fetch_timeout: read_u64(v, "/timeouts/fetch_ms")?.map(Duration::from_millis),
            submit_timeout: read_u64(v, "/timeouts/submit_ms")?.map(Duration::from_millis),
            paper: PaperSection {
                cooldown_secs: read_u64(v, "/paper/cooldown_secs")?
                    .unwrap_or(d.paper.cooldown_secs),
                auto_mine: read_bool(v, "/paper/auto_mine")?.unwrap_or(d.paper.auto_mine),
                redeliver: read_bool(v, "/paper/redeliver")?.unwrap_or(d.paper.redeliver),
            },
            log_filter: read_str(v, "/log/filter")?.unwrap_or(d.log_filter),
        })
    }
}

fn read_u64(v: &Value, ptr: &str) -> Result<Option<u64>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(x) => match x.as_u64() {
            Some(n) => Ok(Some(n)),
            None => bail!("CONFIG_INVALID leaf={ptr}: expected unsigned integer, got {x}"),
        },
    }
}

fn read_bool(v: &Value, ptr: &str) -> Result<Option<bool>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(x) => bail!("CONFIG_INVALID leaf={ptr}: expected boolean, got {x}"),
    }
}

fn read_str(v: &Value, ptr: &str) -> Result<Option<String>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(x) => bail!("CONFIG_INVALID leaf={ptr}: expected string, got {x}"),
    }
}
