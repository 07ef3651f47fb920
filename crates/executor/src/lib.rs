//! # Execution and Ledger Crate
//!
//! This crate turns risk-approved decisions into orders and fills, and keeps
//! the authoritative account state.
//!
//! ## Architectural Principles
//!
//! - **Pricing vs. settlement:** The `OrderExecutor` is a pure calculator. It
//!   prices orders against quotes, modeling slippage and commission, but never
//!   mutates the account. The `Ledger` is the state machine that settles the
//!   resulting `Fill`s, and a fill is recorded on its order only after the
//!   ledger accepts it. This split keeps every cash and position change on one
//!   serialized code path and makes each half testable in isolation.
//! - **Settlement re-validation:** The ledger re-checks every fill (cash for
//!   buys, share availability for sells) even though the risk gate already
//!   approved the decision, because the account can change between approval
//!   and execution when several producers trade in the same cycle.
//!
//! ## Public API
//!
//! - `OrderExecutor`: builds, submits, and re-evaluates orders.
//! - `commission`: the fee schedule shared by all fills.
//! - `Ledger` / `AppliedFill`: account state and the result of settling a fill.
//! - `ExecutorError`: everything that can go wrong in execution or settlement.

pub mod error;
pub mod exchange;
pub mod ledger;

pub use error::ExecutorError;
pub use exchange::{OrderExecutor, commission};
pub use ledger::{AppliedFill, Ledger};
