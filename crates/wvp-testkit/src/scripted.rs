//! Step-controlled fake ledger.
//!
//! Nothing happens on its own: the test decides when an append is accepted,
//! included, rejected, or faulted; when a feed event is pushed; and when a
//! paused fetch returns. The fetch snapshot is taken when the call arrives, so
//! a paused fetch models a response that is already stale in flight.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use wvp_execution::{
    AppendOptions, EntrySink, LedgerClient, LedgerError, Subscription, TxEventSender, TxHandle,
};
use wvp_schemas::{Identity, RawEntry};

/// One recorded `append` call.
#[derive(Debug, Clone)]
pub struct AppendCall {
    pub author: Identity,
    pub message: String,
    pub gas_limit: u64,
}

#[derive(Default)]
struct State {
    stored: Vec<RawEntry>,
    fetch_error: Option<LedgerError>,
    fetch_calls: usize,
    append_error: Option<LedgerError>,
    appends: Vec<AppendCall>,
    /// Ledger side of the latest append, until it is closed.
    current: Option<TxEventSender>,
    listeners: BTreeMap<u64, EntrySink>,
    next_sub: u64,
    subscribe_calls: usize,
    subscribe_error: Option<LedgerError>,
}

pub struct ScriptedLedger {
    state: Arc<Mutex<State>>,
    paused: watch::Sender<bool>,
}

impl Default for ScriptedLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLedger {
    pub fn new() -> Self {
        let (paused, _rx) = watch::channel(false);
        Self {
            state: Arc::default(),
            paused,
        }
    }

    pub fn with_entries(entries: impl IntoIterator<Item = RawEntry>) -> Self {
        let ledger = Self::new();
        ledger.lock().stored.extend(entries);
        ledger
    }

    // ---------------------------------------------------------------------
    // Fetch
    // ---------------------------------------------------------------------

    /// Add an entry to what `fetch_all` returns, without pushing it.
    pub fn store(&self, raw: RawEntry) {
        self.lock().stored.push(raw);
    }

    pub fn fail_fetches(&self, err: Option<LedgerError>) {
        self.lock().fetch_error = err;
    }

    /// Hold every fetch (after its snapshot is taken) until `resume_fetches`.
    pub fn pause_fetches(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_fetches(&self) {
        self.paused.send_replace(false);
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    // ---------------------------------------------------------------------
    // Append
    // ---------------------------------------------------------------------

    pub fn refuse_appends(&self, err: Option<LedgerError>) {
        self.lock().append_error = err;
    }

    pub fn appends(&self) -> Vec<AppendCall> {
        self.lock().appends.clone()
    }

    pub fn append_count(&self) -> usize {
        self.lock().appends.len()
    }

    pub fn accept(&self, tx_hash: &str) -> bool {
        self.current().is_some_and(|s| s.accepted(tx_hash))
    }

    /// Include the latest append: store it at `timestamp` (visible to fetches,
    /// not pushed) and report inclusion.
    pub fn include(&self, timestamp: i64) -> bool {
        let sender = {
            let mut state = self.lock();
            let Some(call) = state.appends.last().cloned() else {
                return false;
            };
            state
                .stored
                .push(RawEntry::new(call.author.as_str(), timestamp, call.message));
            state.current.clone()
        };
        sender.is_some_and(|s| s.included())
    }

    pub fn reject(&self, reason: &str) -> bool {
        self.current().is_some_and(|s| s.rejected(reason))
    }

    pub fn fault(&self, reason: &str) -> bool {
        self.current().is_some_and(|s| s.fault(reason))
    }

    /// Drop the ledger side of the latest append without a terminal event.
    pub fn close_handle(&self) {
        self.lock().current = None;
    }

    // ---------------------------------------------------------------------
    // Feed
    // ---------------------------------------------------------------------

    /// Push `raw` to every listener. Returns how many received it.
    pub fn emit(&self, raw: RawEntry) -> usize {
        let sinks: Vec<EntrySink> = self.lock().listeners.values().cloned().collect();
        for sink in &sinks {
            sink(raw.clone());
        }
        sinks.len()
    }

    pub fn fail_subscribes(&self, err: Option<LedgerError>) {
        self.lock().subscribe_error = err;
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }

    // ---------------------------------------------------------------------
    // Waiting
    // ---------------------------------------------------------------------

    /// Yield until at least `n` appends have been recorded.
    pub async fn wait_for_appends(&self, n: usize) {
        while self.append_count() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Yield until at least `n` fetches have started.
    pub async fn wait_for_fetches(&self, n: usize) {
        while self.fetch_calls() < n {
            tokio::task::yield_now().await;
        }
    }

    fn current(&self) -> Option<TxEventSender> {
        self.lock().current.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl LedgerClient for ScriptedLedger {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_all(&self) -> Result<Vec<RawEntry>, LedgerError> {
        let snapshot = {
            let mut state = self.lock();
            state.fetch_calls += 1;
            if let Some(e) = &state.fetch_error {
                return Err(e.clone());
            }
            state.stored.clone()
        };

        let mut rx = self.paused.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        Ok(snapshot)
    }

    async fn append(
        &self,
        author: &Identity,
        message: &str,
        opts: AppendOptions,
    ) -> Result<TxHandle, LedgerError> {
        let mut state = self.lock();
        state.appends.push(AppendCall {
            author: author.clone(),
            message: message.to_string(),
            gas_limit: opts.gas_limit,
        });
        if let Some(e) = &state.append_error {
            return Err(e.clone());
        }
        let (sender, handle) = TxHandle::channel();
        state.current = Some(sender);
        Ok(handle)
    }

    async fn subscribe(&self, sink: EntrySink) -> Result<Subscription, LedgerError> {
        let mut state = self.lock();
        state.subscribe_calls += 1;
        if let Some(e) = &state.subscribe_error {
            return Err(e.clone());
        }
        state.next_sub += 1;
        let id = state.next_sub;
        state.listeners.insert(id, sink);

        let weak: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        Ok(Subscription::new(id, move || {
            if let Some(state) = weak.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&id);
            }
        }))
    }
}
