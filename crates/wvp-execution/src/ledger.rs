//! Ledger boundary: the capabilities this client consumes.
//!
//! Nothing here talks to a network. Concrete ledgers (paper, scripted test
//! doubles, a real contract binding) implement [`LedgerClient`] and
//! [`ConnectionSession`] outside this crate.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use wvp_schemas::{Identity, RawEntry};

/// Gas ceiling attached to every append unless configured otherwise.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failure at the collaborator boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transport failure talking to the ledger or wallet.
    Network(String),
    /// The ledger or the user refused the write.
    Rejected(String),
    /// The ledger refused because the author wrote too recently.
    RateLimited(String),
    /// The contract call itself failed or returned garbage.
    Contract(String),
    /// The collaborator is gone (handle dropped, provider shut down).
    Closed,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Network(msg) => write!(f, "network error: {msg}"),
            LedgerError::Rejected(msg) => write!(f, "rejected: {msg}"),
            LedgerError::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            LedgerError::Contract(msg) => write!(f, "contract error: {msg}"),
            LedgerError::Closed => write!(f, "ledger connection closed"),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// Append
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOptions {
    pub gas_limit: u64,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// Lifecycle events reported by the ledger for one append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// The network accepted the transaction; it is now being mined.
    Accepted { tx_hash: String },
    /// The transaction was included in the ledger.
    Included,
    /// The ledger or the user refused the transaction.
    Rejected { reason: String },
    /// Any lower-level failure after submission.
    Fault { reason: String },
}

/// Receiving half of an append: yields [`LedgerEvent`]s in the order the
/// ledger reports them.
#[derive(Debug)]
pub struct TxHandle {
    rx: mpsc::UnboundedReceiver<LedgerEvent>,
}

impl TxHandle {
    /// A connected sender/handle pair. Ledgers keep the sender and report
    /// progress through it.
    pub fn channel() -> (TxEventSender, TxHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TxEventSender { tx }, TxHandle { rx })
    }

    /// Next lifecycle event. `None` once the ledger has dropped its sender.
    pub async fn next_event(&mut self) -> Option<LedgerEvent> {
        self.rx.recv().await
    }
}

/// Ledger-side half of a [`TxHandle`].
///
/// Every method returns `false` if the client already dropped the handle.
#[derive(Debug, Clone)]
pub struct TxEventSender {
    tx: mpsc::UnboundedSender<LedgerEvent>,
}

impl TxEventSender {
    pub fn send(&self, ev: LedgerEvent) -> bool {
        self.tx.send(ev).is_ok()
    }

    pub fn accepted(&self, tx_hash: impl Into<String>) -> bool {
        self.send(LedgerEvent::Accepted {
            tx_hash: tx_hash.into(),
        })
    }

    pub fn included(&self) -> bool {
        self.send(LedgerEvent::Included)
    }

    pub fn rejected(&self, reason: impl Into<String>) -> bool {
        self.send(LedgerEvent::Rejected {
            reason: reason.into(),
        })
    }

    pub fn fault(&self, reason: impl Into<String>) -> bool {
        self.send(LedgerEvent::Fault {
            reason: reason.into(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Callback the ledger invokes for each entry on the live feed.
///
/// Delivery is at-least-once; consumers must be idempotent.
pub type EntrySink = Arc<dyn Fn(RawEntry) + Send + Sync>;

/// Handle to one live feed registration.
///
/// Dropping the handle unsubscribes. [`Subscription::unsubscribe`] does the
/// same explicitly. Releasing twice is impossible by construction.
pub struct Subscription {
    id: u64,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// `release` is run exactly once, when the handle is unsubscribed or dropped.
    pub fn new(id: u64, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.release.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Remote append-only ledger.
///
/// Object-safe so callers can hold an `Arc<dyn LedgerClient>`.
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Human-readable name (e.g. `"paper"`).
    fn name(&self) -> &'static str;

    /// Every entry currently in the ledger, in no guaranteed order.
    async fn fetch_all(&self) -> Result<Vec<RawEntry>, LedgerError>;

    /// Submit a write signed by `author`. An `Err` means the ledger refused
    /// before handing back a handle.
    async fn append(
        &self,
        author: &Identity,
        message: &str,
        opts: AppendOptions,
    ) -> Result<TxHandle, LedgerError>;

    /// Register `sink` on the live feed.
    async fn subscribe(&self, sink: EntrySink) -> Result<Subscription, LedgerError>;
}

/// Wallet session: who is signing.
#[async_trait::async_trait]
pub trait ConnectionSession: Send + Sync {
    /// The authorized account, if one is already established. Never prompts.
    fn current_identity(&self) -> Option<Identity>;

    /// Request an account from the wallet, establishing a session.
    async fn connect(&self) -> Result<Identity, LedgerError>;
}
