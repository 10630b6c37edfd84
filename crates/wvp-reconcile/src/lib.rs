//! wvp-reconcile
//!
//! Log reconciliation: one ordered, deduplicated view of the ledger built from
//! two independent inputs.
//!
//! - Full snapshot (`replace_all`): discards the view and rebuilds it.
//! - Incremental push (`apply_incoming`): idempotent ordered insert.
//!
//! Both paths normalize through `Entry::from_raw` and share one ordering, so
//! applying a pushed entry before or after a snapshot that contains it yields
//! the same view.
//!
//! Deterministic, pure logic. No IO, no async.

mod engine;
mod types;

pub use engine::{is_well_formed, view_order, LogReconciler};
pub use types::*;
