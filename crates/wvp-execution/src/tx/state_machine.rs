//! Write transaction state machine.
//!
//! # Design
//!
//! Explicit state machine for a single submitted wave. Every ledger event is
//! applied via [`Transaction::apply`], which enforces:
//!
//! 1. **Forward-only transitions.** No event moves a transaction back to an
//!    earlier phase. Illegal events return [`TransitionError`] and leave the
//!    state untouched.
//! 2. **Idempotent re-acceptance.** A repeated `Accepted` while already
//!    `Mining` is a no-op (ledgers may re-announce the hash).
//!
//! # State diagram
//!
//! ```text
//!   submit()
//!   ───────► Pending ──Accepted──► Mining ──Included──► Confirmed (term.)
//!               │                    │
//!               ├──Rejected──────────┤
//!               └──Fault─────────────┴─────────────────► Failed(reason) (term.)
//! ```
//!
//! `Idle` is never held by a [`Transaction`]; it is what the lifecycle reports
//! when no transaction exists.

use std::fmt;

use uuid::Uuid;
use wvp_schemas::Identity;

// ---------------------------------------------------------------------------
// TxState
// ---------------------------------------------------------------------------

/// Externally observable phase of the write path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TxState {
    /// No transaction in flight.
    Idle,
    /// Handed to the append call; waiting for network acceptance.
    Pending,
    /// Accepted; waiting for inclusion.
    Mining,
    /// Included in the ledger. **Terminal.**
    Confirmed,
    /// Refused or faulted, with a human-readable cause. **Terminal.**
    Failed(String),
}

impl TxState {
    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed(_))
    }

    /// Returns `true` while a write occupies the single-flight slot.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Mining)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Mining => "mining",
            Self::Confirmed => "confirmed",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// TxEvent
// ---------------------------------------------------------------------------

/// Events that drive a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    /// The network accepted the transaction (→ `Mining`).
    Accepted { tx_hash: String },
    /// The transaction was included (→ `Confirmed`).
    Included,
    /// The ledger or the user refused it (→ `Failed`).
    Rejected { reason: String },
    /// Any lower-level failure (→ `Failed`).
    Fault { reason: String },
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// Returned when an event cannot legally be applied in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    /// The state the transaction was in when the illegal event arrived.
    pub from: TxState,
    /// Debug string of the event that was rejected.
    pub event: String,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transaction transition: {} + {}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// One write, from submission to a terminal state.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub tx_id: Uuid,
    pub author: Identity,
    pub message: String,
    /// Set once the ledger accepts the transaction.
    pub tx_hash: Option<String>,
    pub state: TxState,
}

impl Transaction {
    /// A freshly submitted transaction, in `Pending`.
    pub fn submit(author: Identity, message: impl Into<String>) -> Self {
        Self {
            tx_id: Uuid::new_v4(),
            author,
            message: message.into(),
            tx_hash: None,
            state: TxState::Pending,
        }
    }

    /// Apply an event.
    ///
    /// # Errors
    /// Returns [`TransitionError`] for illegal transitions; the state is not
    /// changed.
    pub fn apply(&mut self, event: &TxEvent) -> Result<(), TransitionError> {
        use TxEvent::*;
        use TxState::*;

        match (&self.state, event) {
            (Pending, Accepted { tx_hash }) => {
                self.tx_hash = Some(tx_hash.clone());
                self.state = Mining;
            }

            // Re-announcement of the same acceptance.
            (Mining, Accepted { tx_hash }) if self.tx_hash.as_ref() == Some(tx_hash) => {}

            (Mining, Included) => self.state = Confirmed,

            // A revert while mining is a rejection too.
            (Pending | Mining, Rejected { reason }) => {
                self.state = Failed(format!("rejected: {reason}"));
            }

            (Pending | Mining, Fault { reason }) => {
                self.state = Failed(reason.clone());
            }

            (state, ev) => {
                return Err(TransitionError {
                    from: state.clone(),
                    event: format!("{ev:?}"),
                });
            }
        }

        Ok(())
    }

    /// Force the transaction into `Failed` unless it is already terminal.
    ///
    /// Used when the driver itself gives up (handle closed, caller cancelled).
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = TxState::Failed(reason.into());
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
