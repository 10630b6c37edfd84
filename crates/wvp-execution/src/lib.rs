//! wvp-execution
//!
//! The write path of the wave client.
//!
//! - `ledger` is the capability boundary to the remote ledger and the wallet
//!   session. This crate consumes those traits; it never implements them.
//! - `tx::state_machine` is the explicit, forward-only state machine for one
//!   write transaction.
//! - `lifecycle` drives a single in-flight write through that state machine
//!   and enforces single-flight.

mod ledger;
mod lifecycle;

pub mod tx;

pub use ledger::{
    AppendOptions, ConnectionSession, EntrySink, LedgerClient, LedgerError, LedgerEvent,
    Subscription, TxEventSender, TxHandle, DEFAULT_GAS_LIMIT,
};

pub use lifecycle::{
    ConfirmationHook, NoopHook, SubmitError, TransactionLifecycle, TxReceipt, TxUpdate, UserHint,
};

pub use tx::state_machine::{Transaction, TransitionError, TxEvent, TxState};
