//! # Quorum Market Data
//!
//! This crate defines the interfaces through which the engine talks to the
//! outside market: a `QuoteSource` for prices and a `MarketStats` lookup for
//! correlation/volatility figures. It also ships `SimulatedMarket`, a seeded
//! random-walk implementation of both.
//!
//! ## Architectural Principles
//!
//! - **Randomness stays here.** The risk gate and the ledger are
//!   deterministic functions of their inputs; any simulated price noise is
//!   generated behind these interfaces so tests can substitute fixtures.
//! - **Timeouts belong to the caller.** Implementations may block on I/O;
//!   the scheduler wraps every call in its own timeout and treats a
//!   timed-out quote as unavailable, never as a silent success.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

pub mod error;
pub mod sim;

pub use error::MarketDataError;
pub use sim::SimulatedMarket;

/// A single real-time quote for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub volume: u64,
    /// Fractional change versus the session reference price (0.02 = +2%).
    pub change_percent: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Everything the decision producers get to see for one cycle.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    pub quotes: HashMap<String, Quote>,
    /// Aggregate market sentiment in `[-1, 1]`; neutral when unknown.
    pub sentiment: f64,
    pub taken_at: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.quotes.get(symbol).map(|q| q.price)
    }
}

/// Provides current quotes by symbol. May error or hang; callers own the
/// timeout.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;
}

/// Correlation and volatility lookups the risk gate consumes.
///
/// Synchronous by design: the gate is pure and must not await.
pub trait MarketStats: Send + Sync {
    /// Pairwise correlation in `[-1, 1]`; zero when unknown.
    fn correlation(&self, a: &str, b: &str) -> f64;
    /// Annualized historical volatility; a conservative default when unknown.
    fn volatility(&self, symbol: &str) -> f64;
}
