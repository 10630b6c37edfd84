//! `WaveClient`: one session against one ledger.
//!
//! Control flow:
//! - `start` opens the live feed (wired into the shared log) and performs a
//!   full fetch.
//! - `wave` submits through the transaction lifecycle. On confirmation the log
//!   is refetched before the write path is released, so the confirmed wave is
//!   in the view by the time `wave` returns.
//! - `stop` (or dropping the client) releases the feed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{future, stream, Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use wvp_execution::{
    AppendOptions, ConfirmationHook, ConnectionSession, EntrySink, LedgerClient, LedgerError,
    SubmitError, TransactionLifecycle, TxReceipt, TxState, UserHint, DEFAULT_GAS_LIMIT,
};
use wvp_reconcile::{LogView, ReplaceReport};
use wvp_schemas::Identity;

use crate::log::SharedLog;
use crate::state::{ClientBus, ClientEvent};
use crate::subscription::EventSubscriptionManager;
use crate::timeout::{with_timeout, TimedOut};

// ---------------------------------------------------------------------------
// Options / errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub gas_limit: u64,
    /// Bound on each full fetch. `None` = unbounded.
    pub fetch_timeout: Option<Duration>,
    /// Bound on a submission from append to confirmation. The refetch after
    /// confirmation is bounded by `fetch_timeout` instead.
    pub submit_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            fetch_timeout: None,
            submit_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    Submit(SubmitError),
    Connect(LedgerError),
    Refresh(LedgerError),
    Subscribe(LedgerError),
    TimedOut(TimedOut),
}

impl ClientError {
    pub fn hint(&self) -> UserHint {
        match self {
            ClientError::Submit(e) => e.hint(),
            ClientError::Connect(_) => UserHint::ConnectFirst,
            ClientError::Refresh(_) | ClientError::Subscribe(_) | ClientError::TimedOut(_) => {
                UserHint::TryLater
            }
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Submit(e) => write!(f, "{e}"),
            ClientError::Connect(e) => write!(f, "wallet connection failed: {e}"),
            ClientError::Refresh(e) => write!(f, "log refresh failed: {e}"),
            ClientError::Subscribe(e) => write!(f, "feed subscription failed: {e}"),
            ClientError::TimedOut(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<SubmitError> for ClientError {
    fn from(e: SubmitError) -> Self {
        ClientError::Submit(e)
    }
}

impl From<TimedOut> for ClientError {
    fn from(e: TimedOut) -> Self {
        ClientError::TimedOut(e)
    }
}

// ---------------------------------------------------------------------------
// Confirmation refresh
// ---------------------------------------------------------------------------

/// Refetches the log once a write is confirmed. The pushed event for the
/// write may not have arrived yet, so the fetch is what makes it visible.
struct RefreshOnConfirm {
    log: SharedLog,
    ledger: Arc<dyn LedgerClient>,
    bus: ClientBus,
    fetch_timeout: Option<Duration>,
}

impl RefreshOnConfirm {
    async fn run(&self) -> Result<ReplaceReport, ClientError> {
        match with_timeout("refresh", self.fetch_timeout, self.log.refresh(&*self.ledger)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(ClientError::Refresh(e)),
            Err(elapsed) => {
                warn!(error = %elapsed, "refresh timed out; keeping previous view");
                self.bus.publish(ClientEvent::RefreshFailed {
                    reason: elapsed.to_string(),
                });
                Err(ClientError::TimedOut(elapsed))
            }
        }
    }
}

#[async_trait::async_trait]
impl ConfirmationHook for RefreshOnConfirm {
    async fn on_confirmed(&self, receipt: &TxReceipt) {
        if let Err(e) = self.run().await {
            // The write is confirmed regardless; the next feed event or
            // refresh will bring the view up to date.
            warn!(tx_id = %receipt.tx_id, error = %e, "post-confirmation refresh failed");
        }
    }
}

// ---------------------------------------------------------------------------
// WaveClient
// ---------------------------------------------------------------------------

pub struct WaveClient {
    session: Arc<dyn ConnectionSession>,
    bus: ClientBus,
    log: SharedLog,
    lifecycle: TransactionLifecycle,
    feed: EventSubscriptionManager,
    refresher: Arc<RefreshOnConfirm>,
    opts: ClientOptions,
}

impl WaveClient {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        session: Arc<dyn ConnectionSession>,
        opts: ClientOptions,
    ) -> Self {
        let bus = ClientBus::new();
        let log = SharedLog::new(bus.clone());
        let refresher = Arc::new(RefreshOnConfirm {
            log: log.clone(),
            ledger: Arc::clone(&ledger),
            bus: bus.clone(),
            fetch_timeout: opts.fetch_timeout,
        });
        let lifecycle = TransactionLifecycle::new(Arc::clone(&ledger), Arc::clone(&session))
            .with_hook(refresher.clone())
            .with_options(AppendOptions {
                gas_limit: opts.gas_limit,
            })
            .with_confirm_timeout(opts.submit_timeout);
        let feed = EventSubscriptionManager::new(ledger);

        Self {
            session,
            bus,
            log,
            lifecycle,
            feed,
            refresher,
            opts,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.opts
    }

    /// Open the live feed and load the full log.
    ///
    /// The feed is opened first so nothing written during the fetch is missed.
    /// Calling `start` again replaces the feed rather than adding a second one.
    ///
    /// # Errors
    /// - [`ClientError::Subscribe`] if the feed cannot be opened. A
    ///   [`ClientEvent::FeedFailed`] is published and no fetch is attempted.
    /// - [`ClientError::Refresh`] / [`ClientError::TimedOut`] if the fetch
    ///   fails. The feed stays open and the previous view is kept.
    pub async fn start(&self) -> Result<ReplaceReport, ClientError> {
        let log = self.log.clone();
        let sink: EntrySink = Arc::new(move |raw| {
            log.apply_incoming(raw);
        });
        if let Err(e) = self.feed.start(sink).await {
            warn!(error = %e, "feed subscription failed");
            self.bus.publish(ClientEvent::FeedFailed {
                reason: e.to_string(),
            });
            return Err(ClientError::Subscribe(e));
        }
        self.bus.publish(ClientEvent::Feed { active: true });

        self.refresh().await
    }

    /// Release the live feed. Safe to call repeatedly.
    pub fn stop(&self) {
        if self.feed.is_active() {
            self.feed.stop();
            self.bus.publish(ClientEvent::Feed { active: false });
        }
    }

    /// Ask the wallet for an account, then start the session.
    ///
    /// # Errors
    /// - [`ClientError::Connect`] if the wallet refuses. Nothing is started.
    /// - Any [`start`](Self::start) error. The wallet session stays
    ///   established (see [`identity`](Self::identity)), so a later `start`
    ///   or `refresh` can recover the read path.
    pub async fn connect(&self) -> Result<Identity, ClientError> {
        let identity = self.session.connect().await.map_err(ClientError::Connect)?;
        info!(%identity, "wallet connected");
        self.start().await?;
        Ok(identity)
    }

    /// Fetch the full log and replace the view.
    pub async fn refresh(&self) -> Result<ReplaceReport, ClientError> {
        self.refresher.run().await
    }

    /// Submit one wave and wait for it to be confirmed and reflected.
    ///
    /// A confirmed write is reported as success even if the refetch that
    /// follows fails or times out; that failure is published on the bus.
    pub async fn wave(&self, message: &str) -> Result<TxReceipt, ClientError> {
        Ok(self.lifecycle.submit(message).await?)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.current_identity()
    }

    pub fn is_live(&self) -> bool {
        self.feed.is_active()
    }

    pub fn view(&self) -> LogView {
        self.log.view()
    }

    pub fn total_waves(&self) -> usize {
        self.log.len()
    }

    pub fn tx_state(&self) -> TxState {
        self.lifecycle.state()
    }

    /// All client events from now on: view changes, feed state, and write
    /// path transitions. Lagging receivers skip what they missed.
    pub fn events(&self) -> impl Stream<Item = ClientEvent> + Send + Unpin + 'static {
        let view =
            BroadcastStream::new(self.bus.subscribe()).filter_map(|r| future::ready(r.ok()));
        let tx = BroadcastStream::new(self.lifecycle.updates())
            .filter_map(|r| future::ready(r.ok().map(ClientEvent::from)));
        stream::select(view, tx)
    }
}

impl Drop for WaveClient {
    fn drop(&mut self) {
        self.stop();
    }
}
