//! # Decision Producer Library
//!
//! This crate contains the decision-making logic of the system. It defines the
//! universal `DecisionProducer` trait and provides the concrete producers.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** Producers read a `MarketSnapshot` and propose `Decision`s.
//!   They have no access to the ledger, the risk gate, or execution, so a
//!   misbehaving producer can at worst propose a trade the gate will reject.
//! - **Producer-agnostic engine:** The engine fans snapshots out to any set of
//!   `DecisionProducer`s without knowing their internals.
//! - **Extensibility:** Adding a producer means a new module, a `ProducerId`
//!   variant, and a `factory` arm.
//!
//! ## Public API
//!
//! - `DecisionProducer`: the trait all producers implement.
//! - `create_producer`: the factory constructing a producer from configuration.
//! - The concrete producers themselves (`Momentum`, `Reversion`).

pub mod error;
pub mod factory;
pub mod momentum;
pub mod reversion;

pub use error::ProducerError;
pub use factory::create_producer;
pub use momentum::Momentum;
pub use reversion::Reversion;

use async_trait::async_trait;
use core_types::Decision;
use market_data::MarketSnapshot;

/// The core trait all decision producers implement.
///
/// `produce` is `&self` because producers are stateless between cycles; every
/// call judges one snapshot on its own. The `Send + Sync` bounds let the
/// engine poll all producers concurrently.
#[async_trait]
pub trait DecisionProducer: Send + Sync {
    /// A stable name used as the `source` of every decision this producer
    /// emits, and in logs.
    fn name(&self) -> &str;

    /// Evaluates the snapshot.
    ///
    /// Returns `Ok(Some(Decision))` when the producer wants to trade,
    /// `Ok(None)` when it sees nothing actionable.
    async fn produce(&self, snapshot: &MarketSnapshot) -> Result<Option<Decision>, ProducerError>;
}
