//! Transaction lifecycle: drives one write from submission to a terminal state.
//!
//! # Invariants
//!
//! - **Single-flight.** At most one transaction occupies the slot. A second
//!   `submit` while one is `Pending`/`Mining` fails fast with
//!   [`SubmitError::Busy`] and leaves the first untouched.
//! - **Local errors never reach the ledger.** Empty messages and missing
//!   sessions are refused before any remote call.
//! - **No automatic retry.** Any fault before `Confirmed` is terminal for the
//!   attempt and surfaces as `Failed(reason)`.
//! - **The slot is always released.** The in-flight guard resets to `Idle` on
//!   every exit path, including the submit future being dropped by a caller
//!   timeout.
//! - **The confirmation bound ends at `Confirmed`.** An optional limit covers
//!   append through confirmation only. The confirmation hook runs outside it.
//!
//! Mutations of the slot happen under a short synchronous lock that is never
//! held across an `.await`.

use std::fmt;
use std::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;
use wvp_schemas::Identity;

use crate::ledger::{AppendOptions, ConnectionSession, LedgerClient, LedgerEvent};
use crate::tx::state_machine::{Transaction, TransitionError, TxEvent, TxState};

const UPDATE_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Proof of a confirmed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_id: Uuid,
    pub tx_hash: Option<String>,
    pub author: Identity,
    pub message: String,
}

/// One state change, broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxUpdate {
    pub tx_id: Uuid,
    pub state: TxState,
    pub tx_hash: Option<String>,
}

/// Which of the four user-facing situations an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserHint {
    FixInput,
    ConnectFirst,
    InProgress,
    TryLater,
}

impl UserHint {
    pub fn message(&self) -> &'static str {
        match self {
            UserHint::FixInput => "Write a message before waving.",
            UserHint::ConnectFirst => "Connect a wallet account before waving.",
            UserHint::InProgress => "A wave is already being mined; wait for it to finish.",
            UserHint::TryLater => {
                "The ledger did not accept the wave. If you already waved recently, try again later."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The message is empty after trimming.
    Validation(String),
    /// No wallet identity is established.
    NotConnected,
    /// Another write is in flight.
    Busy { in_flight: Uuid },
    /// The attempt reached `Failed(reason)`.
    Remote { tx_id: Uuid, reason: String },
}

impl SubmitError {
    pub fn hint(&self) -> UserHint {
        match self {
            SubmitError::Validation(_) => UserHint::FixInput,
            SubmitError::NotConnected => UserHint::ConnectFirst,
            SubmitError::Busy { .. } => UserHint::InProgress,
            SubmitError::Remote { .. } => UserHint::TryLater,
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Validation(msg) => write!(f, "invalid input: {msg}"),
            SubmitError::NotConnected => write!(f, "no wallet session established"),
            SubmitError::Busy { in_flight } => {
                write!(f, "transaction {in_flight} is already in flight")
            }
            SubmitError::Remote { tx_id, reason } => {
                write!(f, "transaction {tx_id} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for SubmitError {}

/// Invoked after `Confirmed`, while the transaction still holds the slot.
///
/// The runtime uses this to refetch the ledger so the confirmed write is
/// reflected before the next submission is allowed.
#[async_trait::async_trait]
pub trait ConfirmationHook: Send + Sync {
    async fn on_confirmed(&self, receipt: &TxReceipt);
}

/// Hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

#[async_trait::async_trait]
impl ConfirmationHook for NoopHook {
    async fn on_confirmed(&self, _receipt: &TxReceipt) {}
}

impl From<LedgerEvent> for TxEvent {
    fn from(ev: LedgerEvent) -> Self {
        match ev {
            LedgerEvent::Accepted { tx_hash } => TxEvent::Accepted { tx_hash },
            LedgerEvent::Included => TxEvent::Included,
            LedgerEvent::Rejected { reason } => TxEvent::Rejected { reason },
            LedgerEvent::Fault { reason } => TxEvent::Fault { reason },
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionLifecycle
// ---------------------------------------------------------------------------

pub struct TransactionLifecycle {
    ledger: Arc<dyn LedgerClient>,
    session: Arc<dyn ConnectionSession>,
    hook: Arc<dyn ConfirmationHook>,
    opts: AppendOptions,
    confirm_timeout: Option<Duration>,
    slot: Mutex<Option<Transaction>>,
    updates: broadcast::Sender<TxUpdate>,
}

impl TransactionLifecycle {
    pub fn new(ledger: Arc<dyn LedgerClient>, session: Arc<dyn ConnectionSession>) -> Self {
        let (updates, _rx) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            ledger,
            session,
            hook: Arc::new(NoopHook),
            opts: AppendOptions::default(),
            confirm_timeout: None,
            slot: Mutex::new(None),
            updates,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ConfirmationHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_options(mut self, opts: AppendOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Give up on a write that is not confirmed within `limit`.
    pub fn with_confirm_timeout(mut self, limit: Option<Duration>) -> Self {
        self.confirm_timeout = limit;
        self
    }

    /// Current phase; `Idle` when nothing is in flight.
    pub fn state(&self) -> TxState {
        self.slot()
            .as_ref()
            .map(|tx| tx.state.clone())
            .unwrap_or(TxState::Idle)
    }

    /// Copy of the in-flight transaction, if any.
    pub fn current(&self) -> Option<Transaction> {
        self.slot().clone()
    }

    /// Receive every state change from now on.
    pub fn updates(&self) -> broadcast::Receiver<TxUpdate> {
        self.updates.subscribe()
    }

    /// Submit one wave and drive it to a terminal state.
    ///
    /// Returns the receipt once the write is confirmed and the confirmation
    /// hook has run.
    ///
    /// # Errors
    /// - [`SubmitError::Validation`] for a blank message (no remote call).
    /// - [`SubmitError::NotConnected`] without an identity (no remote call).
    /// - [`SubmitError::Busy`] while another write is in flight.
    /// - [`SubmitError::Remote`] when the attempt ends in `Failed`, including
    ///   when it is not confirmed within the confirmation bound.
    pub async fn submit(&self, message: &str) -> Result<TxReceipt, SubmitError> {
        if message.trim().is_empty() {
            return Err(SubmitError::Validation("message is empty".to_string()));
        }
        let author = self
            .session
            .current_identity()
            .ok_or(SubmitError::NotConnected)?;

        let flight = self.claim(author.clone(), message)?;

        let confirmed = match self.confirm_timeout {
            None => self.drive(&flight, &author, message).await?,
            Some(after) => {
                match tokio::time::timeout(after, self.drive(&flight, &author, message)).await {
                    Ok(res) => res?,
                    Err(_) => {
                        return Err(flight.fail(format!(
                            "not confirmed within {}ms",
                            after.as_millis()
                        )))
                    }
                }
            }
        };

        let receipt = TxReceipt {
            tx_id: confirmed.tx_id,
            tx_hash: confirmed.tx_hash,
            author: confirmed.author,
            message: confirmed.message,
        };
        self.hook.on_confirmed(&receipt).await;
        Ok(receipt)
    }

    /// Append and follow the handle until `Confirmed` or `Failed`.
    async fn drive(
        &self,
        flight: &InFlight<'_>,
        author: &Identity,
        message: &str,
    ) -> Result<Transaction, SubmitError> {
        let mut handle = match self.ledger.append(author, message, self.opts).await {
            Ok(handle) => handle,
            Err(e) => return Err(flight.fail(e.to_string())),
        };

        loop {
            let Some(ev) = handle.next_event().await else {
                return Err(flight.fail("ledger closed the transaction handle"));
            };
            match flight.apply(TxEvent::from(ev)) {
                Ok(tx) => match tx.state {
                    TxState::Confirmed => return Ok(tx),
                    TxState::Failed(reason) => {
                        return Err(SubmitError::Remote {
                            tx_id: tx.tx_id,
                            reason,
                        })
                    }
                    _ => {}
                },
                Err(e) => return Err(flight.fail(e.to_string())),
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Transaction>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, tx: &Transaction) {
        let _ = self.updates.send(TxUpdate {
            tx_id: tx.tx_id,
            state: tx.state.clone(),
            tx_hash: tx.tx_hash.clone(),
        });
    }

    /// Take the single-flight slot, or report who holds it.
    fn claim(&self, author: Identity, message: &str) -> Result<InFlight<'_>, SubmitError> {
        let mut slot = self.slot();
        if let Some(existing) = slot.as_ref() {
            warn!(in_flight = %existing.tx_id, "submit refused: transaction in flight");
            return Err(SubmitError::Busy {
                in_flight: existing.tx_id,
            });
        }

        let tx = Transaction::submit(author, message);
        let tx_id = tx.tx_id;
        info!(%tx_id, author = %tx.author, "transaction pending");
        self.publish(&tx);
        *slot = Some(tx);

        Ok(InFlight {
            lifecycle: self,
            tx_id,
        })
    }
}

// ---------------------------------------------------------------------------
// InFlight guard
// ---------------------------------------------------------------------------

/// Ownership of the single-flight slot for one transaction.
///
/// Dropping the guard discards the transaction and returns to `Idle`. If the
/// transaction is not terminal at that point (the submit future was dropped),
/// it is marked `Failed` first so observers see an ending.
struct InFlight<'a> {
    lifecycle: &'a TransactionLifecycle,
    tx_id: Uuid,
}

impl InFlight<'_> {
    /// Apply `ev` and return a copy of the resulting transaction.
    fn apply(&self, ev: TxEvent) -> Result<Transaction, TransitionError> {
        let mut slot = self.lifecycle.slot();
        let Some(tx) = slot.as_mut() else {
            return Err(TransitionError {
                from: TxState::Idle,
                event: format!("{ev:?}"),
            });
        };
        tx.apply(&ev)?;

        match &tx.state {
            TxState::Mining => {
                info!(tx_id = %tx.tx_id, tx_hash = tx.tx_hash.as_deref(), "transaction mining")
            }
            TxState::Confirmed => {
                info!(tx_id = %tx.tx_id, tx_hash = tx.tx_hash.as_deref(), "transaction confirmed")
            }
            TxState::Failed(reason) => {
                warn!(tx_id = %tx.tx_id, %reason, "transaction failed")
            }
            _ => {}
        }
        self.lifecycle.publish(tx);
        Ok(tx.clone())
    }

    /// Mark the transaction failed and build the matching error.
    fn fail(&self, reason: impl Into<String>) -> SubmitError {
        let reason = reason.into();
        let mut slot = self.lifecycle.slot();
        if let Some(tx) = slot.as_mut() {
            tx.fail(reason.clone());
            warn!(tx_id = %tx.tx_id, %reason, "transaction failed");
            self.lifecycle.publish(tx);
        }
        SubmitError::Remote {
            tx_id: self.tx_id,
            reason,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut slot = self.lifecycle.slot();
        let Some(mut tx) = slot.take() else {
            return;
        };
        if !tx.state.is_terminal() {
            tx.fail("cancelled before completion");
            warn!(tx_id = %tx.tx_id, "transaction abandoned by caller");
            self.lifecycle.publish(&tx);
        }
        tx.state = TxState::Idle;
        self.lifecycle.publish(&tx);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
