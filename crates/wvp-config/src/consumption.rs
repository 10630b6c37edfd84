/// JSON-pointer prefixes read by [`crate::ClientConfig::from_json`].
///
/// Keep in step with the reads there; anything outside these is reported by
/// [`crate::report_unused_keys`].
pub static CONSUMED_POINTERS: &[&str] = &[
    "/ledger/contract_address",
    "/ledger/gas_limit",
    "/timeouts/fetch_ms",
    "/timeouts/submit_ms",
    "/paper/cooldown_secs",
    "/paper/auto_mine",
    "/paper/redeliver",
    "/log/filter",
];
