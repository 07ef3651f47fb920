//! # Quorum Risk Crate
//!
//! Gates decisions before they become orders. The gate is a pure function of
//! (decision, ledger snapshot, policy): it never mutates state, never does
//! I/O, and is deterministic given its inputs, which is what makes its six
//! checks unit-testable in isolation.

use core_types::{Decision, RiskVerdict};
use events::LedgerSnapshot;
use market_data::MarketStats;
use rust_decimal::Decimal;

pub mod error;
pub mod gate;

pub use error::RiskError;
pub use gate::PolicyGate;

/// Everything the gate needs to judge one decision.
///
/// The estimated price is resolved by the scheduler (live quote, or the
/// decision's limit price) before the gate runs, so no market I/O happens
/// inside the evaluation.
pub struct RiskContext<'a> {
    pub snapshot: &'a LedgerSnapshot,
    pub estimated_price: Decimal,
    pub initial_capital: Decimal,
    /// Realized P&L accumulated since the configured session boundary.
    pub realized_pnl_today: Decimal,
    pub stats: &'a dyn MarketStats,
}

/// The core trait for risk evaluation.
///
/// Implementations must be side-effect-free so the scheduler can call them
/// between taking a ledger snapshot and executing the order.
pub trait RiskGate: Send + Sync {
    fn evaluate(&self, decision: &Decision, ctx: &RiskContext) -> RiskVerdict;
}
