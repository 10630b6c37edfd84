//! Write transaction state machine.
//!
//! One explicit, forward-only state machine per submitted wave. Illegal
//! transitions return a `TransitionError`, which the lifecycle treats as a
//! terminal fault for that attempt.

pub mod state_machine;
