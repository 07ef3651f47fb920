use crate::enums::{OrderKind, OrderStatus, TradeAction};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trading instruction produced by an external decision source.
///
/// Decisions are immutable once created; the risk gate never edits one, it
/// returns an adjusted quantity in its verdict instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub action: TradeAction,
    /// Requested number of shares. The gate may shrink this; see `RiskVerdict`.
    pub quantity: u64,
    /// Producer confidence in the decision, in `[0, 1]`.
    pub confidence: Decimal,
    /// When set, the order becomes a limit order at this price.
    pub limit_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Identifier of the producer that created this decision.
    pub source: String,
    /// Free-text explanation from the producer, carried through to the
    /// trade record for operators.
    pub rationale: String,
}

/// The risk gate's outcome for one decision.
///
/// Carries both the requested and the adjusted quantity so downstream
/// consumers can explain any discrepancy to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub approved: bool,
    pub requested_quantity: u64,
    pub adjusted_quantity: u64,
    /// Accumulated risk score; zero is riskless, higher is riskier.
    pub risk_score: f64,
    pub warnings: Vec<String>,
    /// Human-readable rejection reason. `None` when approved.
    pub reason: Option<String>,
}

impl RiskVerdict {
    pub fn approve(
        requested: u64,
        adjusted: u64,
        risk_score: f64,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            approved: true,
            requested_quantity: requested,
            adjusted_quantity: adjusted,
            risk_score,
            warnings,
            reason: None,
        }
    }

    pub fn reject(requested: u64, reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            requested_quantity: requested,
            adjusted_quantity: 0,
            risk_score: 0.0,
            warnings: Vec::new(),
            reason: Some(reason.into()),
        }
    }
}

/// A single quantity@price execution event against an order. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: Uuid,
    pub order_id: Uuid,
    pub symbol: String,
    pub quantity: u64,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn new(
        order_id: Uuid,
        symbol: impl Into<String>,
        quantity: u64,
        price: Decimal,
        commission: Decimal,
    ) -> Self {
        Self {
            fill_id: Uuid::new_v4(),
            order_id,
            symbol: symbol.into(),
            quantity,
            price,
            commission,
            timestamp: Utc::now(),
        }
    }
}

/// The internal unit of work tracking a decision's execution lifecycle.
///
/// Owned exclusively by the executor until terminal; afterwards it is
/// read-only history. All state changes go through the transition methods
/// below, which enforce the monotonic status machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: u64,
    pub kind: OrderKind,
    pub limit_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_quantity: u64,
    pub avg_fill_price: Decimal,
    pub commission: Decimal,
    /// Identifier of the decision source that originated this order.
    pub source: String,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a `Pending` order from a decision and the gate-approved
    /// quantity. A decision without a limit price becomes a market order.
    pub fn from_decision(decision: &Decision, quantity: u64) -> Self {
        let kind = if decision.limit_price.is_some() {
            OrderKind::Limit
        } else {
            OrderKind::Market
        };
        let now = Utc::now();
        Self {
            order_id: Uuid::new_v4(),
            symbol: decision.symbol.clone(),
            action: decision.action,
            quantity,
            kind,
            limit_price: decision.limit_price,
            status: OrderStatus::Pending,
            filled_quantity: 0,
            avg_fill_price: Decimal::ZERO,
            commission: Decimal::ZERO,
            source: decision.source.clone(),
            rationale: decision.rationale.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining_quantity(&self) -> u64 {
        self.quantity - self.filled_quantity
    }

    /// Pending -> Submitted. Calling this in any other state is a
    /// programming error in the executor, hence the panic.
    pub fn submit(&mut self) {
        assert_eq!(
            self.status,
            OrderStatus::Pending,
            "submit called on a non-pending order ({:?})",
            self.status
        );
        self.status = OrderStatus::Submitted;
        self.touch();
    }

    /// Records a fill against this order, moving it to `PartiallyFilled` or
    /// `Filled`. Panics if the order is terminal or the fill would exceed
    /// the requested quantity; the executor must never produce either.
    pub fn record_fill(&mut self, fill: &Fill) {
        assert!(
            !self.status.is_terminal(),
            "fill recorded against terminal order {} ({:?})",
            self.order_id,
            self.status
        );
        assert!(
            fill.quantity <= self.remaining_quantity(),
            "fill quantity {} exceeds remaining {} on order {}",
            fill.quantity,
            self.remaining_quantity(),
            self.order_id
        );

        // Weighted average across all fills received so far.
        let prev = Decimal::from(self.filled_quantity);
        let new = Decimal::from(fill.quantity);
        let total = prev + new;
        if !total.is_zero() {
            self.avg_fill_price = (self.avg_fill_price * prev + fill.price * new) / total;
        }
        self.filled_quantity += fill.quantity;
        self.commission += fill.commission;

        self.status = if self.filled_quantity == self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.touch();
    }

    /// Operator-initiated cancellation. Refused on terminal orders.
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalOrder(self.order_id, self.status));
        }
        self.status = OrderStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// Marks the order rejected, e.g. when no quote is available.
    pub fn reject(&mut self) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalOrder(self.order_id, self.status));
        }
        self.status = OrderStatus::Rejected;
        self.touch();
        Ok(())
    }

    /// Expires a standing limit order that outlived its configured lifetime.
    pub fn expire(&mut self) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalOrder(self.order_id, self.status));
        }
        self.status = OrderStatus::Expired;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The ledger's current holding in one symbol.
///
/// A position exists only while `quantity > 0`; the ledger removes the entry
/// the moment it reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    /// Weighted average cost basis across all buy fills.
    pub avg_cost: Decimal,
    /// Last market price the ledger was told about.
    pub current_price: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    pub fn market_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.current_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        (self.current_price - self.avg_cost) * Decimal::from(self.quantity)
    }

    pub fn unrealized_pnl_pct(&self) -> Decimal {
        if self.avg_cost.is_zero() {
            return Decimal::ZERO;
        }
        (self.current_price - self.avg_cost) / self.avg_cost
    }
}

/// One entry in the ledger's append-only trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: u64,
    pub price: Decimal,
    pub commission: Decimal,
    /// Realized P&L, present only for sells.
    pub realized_pnl: Option<Decimal>,
    pub source: String,
    pub rationale: String,
}
