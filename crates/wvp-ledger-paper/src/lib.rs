//! Deterministic in-memory "paper" wave ledger.
//!
//! Design decisions (kept simple and deterministic):
//! - Transaction hashes are stable strings derived from a sequence number:
//!   `"paper:tx:{seq}"`.
//! - Time is a logical clock (`set_time` / `advance`); entries are stamped with
//!   the clock at mining time. No wall-clock reads.
//! - Per-author cooldown mirrors the contract's "one wave per window" rule and
//!   is reported as [`LedgerError::RateLimited`] at append time.
//! - With `auto_mine` every accepted append is included immediately. Without
//!   it, appends stay pending until [`PaperLedger::mine_pending`] or
//!   [`PaperLedger::reject_pending`].
//! - With `redeliver`, every feed event is delivered twice to exercise
//!   at-least-once consumers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;
use wvp_execution::{
    AppendOptions, EntrySink, LedgerClient, LedgerError, Subscription, TxEventSender, TxHandle,
};
use wvp_schemas::{Identity, RawEntry};

mod session;

pub use session::PaperSession;

/// Appends below this gas ceiling run out of gas.
pub const MIN_GAS_LIMIT: u64 = 21_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperConfig {
    /// Seconds an author must wait between waves. `0` disables the limit.
    pub cooldown_secs: i64,
    pub auto_mine: bool,
    pub redeliver: bool,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 0,
            auto_mine: true,
            redeliver: false,
        }
    }
}

struct Pending {
    sender: TxEventSender,
    entry: RawEntry,
}

#[derive(Default)]
struct Inner {
    entries: Vec<RawEntry>,
    pending: Vec<Pending>,
    listeners: BTreeMap<u64, EntrySink>,
    last_wave: HashMap<String, i64>,
    now: i64,
    next_sub: u64,
    next_tx: u64,
    offline: bool,
}

/// Cloneable handle; clones share the same ledger.
#[derive(Clone, Default)]
pub struct PaperLedger {
    inner: Arc<Mutex<Inner>>,
    cfg: PaperConfig,
}

impl PaperLedger {
    pub fn new(cfg: PaperConfig) -> Self {
        Self {
            inner: Arc::default(),
            cfg,
        }
    }

    pub fn config(&self) -> PaperConfig {
        self.cfg
    }

    // ---------------------------------------------------------------------
    // Scenario wiring
    // ---------------------------------------------------------------------

    /// Append entries directly, bypassing validation and the feed. Malformed
    /// rows are stored as-is so readers see them.
    pub fn seed(&self, entries: impl IntoIterator<Item = RawEntry>) {
        self.lock().entries.extend(entries);
    }

    /// Seed from a JSON array of entries. Returns how many were added.
    pub fn seed_json(&self, json: &str) -> Result<usize, serde_json::Error> {
        let entries: Vec<RawEntry> = serde_json::from_str(json)?;
        let n = entries.len();
        self.seed(entries);
        Ok(n)
    }

    pub fn set_time(&self, now: i64) {
        self.lock().now = now;
    }

    pub fn advance(&self, secs: i64) {
        self.lock().now += secs;
    }

    pub fn now(&self) -> i64 {
        self.lock().now
    }

    /// While offline, full fetches fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Write an entry from some other client: stored and pushed to listeners.
    pub fn emit(&self, entry: RawEntry) {
        let sinks = {
            let mut inner = self.lock();
            inner.entries.push(entry.clone());
            inner.listeners.values().cloned().collect::<Vec<_>>()
        };
        self.deliver(&sinks, &[entry]);
    }

    // ---------------------------------------------------------------------
    // Mining
    // ---------------------------------------------------------------------

    /// Include every pending append at the current time. Returns how many were
    /// mined.
    pub fn mine_pending(&self) -> usize {
        let (mined, sinks) = {
            let mut inner = self.lock();
            let now = inner.now;
            let pending = std::mem::take(&mut inner.pending);
            let mut mined = Vec::with_capacity(pending.len());
            for p in pending {
                let mut entry = p.entry;
                entry.timestamp = Some(now);
                inner.entries.push(entry.clone());
                mined.push((p.sender, entry));
            }
            (mined, inner.listeners.values().cloned().collect::<Vec<_>>())
        };

        let entries: Vec<RawEntry> = mined.iter().map(|(_, e)| e.clone()).collect();
        self.deliver(&sinks, &entries);
        for (sender, _) in &mined {
            sender.included();
        }
        debug!(count = mined.len(), "paper ledger mined pending appends");
        mined.len()
    }

    /// Refuse every pending append. Nothing is written.
    pub fn reject_pending(&self, reason: &str) -> usize {
        let pending = std::mem::take(&mut self.lock().pending);
        for p in &pending {
            p.sender.rejected(reason);
        }
        pending.len()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn entries(&self) -> Vec<RawEntry> {
        self.lock().entries.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn deliver(&self, sinks: &[EntrySink], entries: &[RawEntry]) {
        let rounds = if self.cfg.redeliver { 2 } else { 1 };
        for _ in 0..rounds {
            for entry in entries {
                for sink in sinks {
                    sink(entry.clone());
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl LedgerClient for PaperLedger {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn fetch_all(&self) -> Result<Vec<RawEntry>, LedgerError> {
        let inner = self.lock();
        if inner.offline {
            return Err(LedgerError::Network("paper ledger offline".to_string()));
        }
        Ok(inner.entries.clone())
    }

    async fn append(
        &self,
        author: &Identity,
        message: &str,
        opts: AppendOptions,
    ) -> Result<TxHandle, LedgerError> {
        if opts.gas_limit < MIN_GAS_LIMIT {
            return Err(LedgerError::Contract(format!(
                "out of gas: limit {} below {MIN_GAS_LIMIT}",
                opts.gas_limit
            )));
        }

        let (sender, handle) = TxHandle::channel();
        {
            let mut inner = self.lock();
            let now = inner.now;
            if self.cfg.cooldown_secs > 0 {
                if let Some(last) = inner.last_wave.get(author.as_str()) {
                    let ready_at = last + self.cfg.cooldown_secs;
                    if now < ready_at {
                        return Err(LedgerError::RateLimited(format!(
                            "wait {}s before waving again",
                            ready_at - now
                        )));
                    }
                }
            }
            inner.last_wave.insert(author.as_str().to_string(), now);

            inner.next_tx += 1;
            let tx_hash = format!("paper:tx:{}", inner.next_tx);
            debug!(%author, %tx_hash, "paper ledger accepted append");
            sender.accepted(tx_hash);
            inner.pending.push(Pending {
                sender,
                entry: RawEntry::new(author.as_str(), now, message),
            });
        }

        if self.cfg.auto_mine {
            self.mine_pending();
        }
        Ok(handle)
    }

    async fn subscribe(&self, sink: EntrySink) -> Result<Subscription, LedgerError> {
        let id = {
            let mut inner = self.lock();
            inner.next_sub += 1;
            let id = inner.next_sub;
            inner.listeners.insert(id, sink);
            id
        };

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&id);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wvp_execution::LedgerEvent;

    fn alice() -> Identity {
        Identity::new("0xa11ce")
    }

    fn counting_sink() -> (EntrySink, Arc<AtomicUsize>) {
        let n = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&n);
        (
            Arc::new(move |_raw| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            n,
        )
    }

    #[tokio::test]
    async fn auto_mined_append_reports_accept_then_include() {
        let ledger = PaperLedger::default();
        ledger.set_time(100);
        let mut h = ledger
            .append(&alice(), "hi", AppendOptions::default())
            .await
            .unwrap();

        assert_eq!(
            h.next_event().await,
            Some(LedgerEvent::Accepted {
                tx_hash: "paper:tx:1".into()
            })
        );
        assert_eq!(h.next_event().await, Some(LedgerEvent::Included));
        assert_eq!(ledger.entries(), vec![RawEntry::new("0xa11ce", 100, "hi")]);
    }

    #[tokio::test]
    async fn cooldown_rate_limits_same_author() {
        let ledger = PaperLedger::new(PaperConfig {
            cooldown_secs: 900,
            ..PaperConfig::default()
        });
        ledger.append(&alice(), "1", AppendOptions::default()).await.unwrap();

        ledger.advance(60);
        let err = ledger
            .append(&alice(), "2", AppendOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::RateLimited("wait 840s before waving again".into())
        );

        // Other authors are not affected.
        assert!(ledger
            .append(&Identity::new("0xb0b"), "3", AppendOptions::default())
            .await
            .is_ok());

        ledger.advance(840);
        assert!(ledger.append(&alice(), "4", AppendOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn low_gas_limit_is_refused() {
        let ledger = PaperLedger::default();
        let err = ledger
            .append(&alice(), "x", AppendOptions { gas_limit: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Contract(_)));
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn manual_mining_holds_appends_until_mined() {
        let ledger = PaperLedger::new(PaperConfig {
            auto_mine: false,
            ..PaperConfig::default()
        });
        let (sink, delivered) = counting_sink();
        let _sub = ledger.subscribe(sink).await.unwrap();

        let mut h = ledger.append(&alice(), "x", AppendOptions::default()).await.unwrap();
        assert!(matches!(h.next_event().await, Some(LedgerEvent::Accepted { .. })));
        assert_eq!(ledger.pending_len(), 1);
        assert!(ledger.fetch_all().await.unwrap().is_empty());

        ledger.set_time(42);
        assert_eq!(ledger.mine_pending(), 1);
        assert_eq!(h.next_event().await, Some(LedgerEvent::Included));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.fetch_all().await.unwrap()[0].timestamp, Some(42));
    }

    #[tokio::test]
    async fn rejected_pending_writes_nothing() {
        let ledger = PaperLedger::new(PaperConfig {
            auto_mine: false,
            ..PaperConfig::default()
        });
        let mut h = ledger.append(&alice(), "x", AppendOptions::default()).await.unwrap();
        assert_eq!(ledger.reject_pending("user denied"), 1);
        let _accepted = h.next_event().await;
        assert_eq!(
            h.next_event().await,
            Some(LedgerEvent::Rejected {
                reason: "user denied".into()
            })
        );
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn dropping_subscription_removes_listener() {
        let ledger = PaperLedger::default();
        let (sink, delivered) = counting_sink();
        let sub = ledger.subscribe(sink).await.unwrap();
        assert_eq!(ledger.listener_count(), 1);
        drop(sub);
        assert_eq!(ledger.listener_count(), 0);

        ledger.emit(RawEntry::new("0xb0b", 1, "later"));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn redeliver_pushes_each_event_twice() {
        let ledger = PaperLedger::new(PaperConfig {
            redeliver: true,
            ..PaperConfig::default()
        });
        let (sink, delivered) = counting_sink();
        let _sub = ledger.subscribe(sink).await.unwrap();
        ledger.emit(RawEntry::new("0xb0b", 1, "hey"));
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn offline_fetch_fails() {
        let ledger = PaperLedger::default();
        ledger.set_offline(true);
        assert!(matches!(
            ledger.fetch_all().await,
            Err(LedgerError::Network(_))
        ));
    }

    #[test]
    fn seed_json_accepts_contract_field_names() {
        let ledger = PaperLedger::default();
        let n = ledger
            .seed_json(r#"[{"waver":"0xa","timestamp":5,"message":"gm"},{"message":"orphan"}]"#)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(ledger.entries()[0], RawEntry::new("0xa", 5, "gm"));
        assert_eq!(ledger.entries()[1].author, None);
    }
}
