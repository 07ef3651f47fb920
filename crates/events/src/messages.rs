use chrono::{DateTime, Utc};
use core_types::{Fill, Order, OrderKind, OrderStatus, Position, RiskVerdict, TradeAction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One open position inside a `LedgerSnapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub symbol: String,
    pub qty: u64,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
}

impl From<&Position> for PositionRecord {
    fn from(position: &Position) -> Self {
        Self {
            symbol: position.symbol.clone(),
            qty: position.quantity,
            avg_cost: position.avg_cost,
            current_price: position.current_price,
        }
    }
}

/// A complete, owned snapshot of the ledger's state.
///
/// This is the read-side view of the portfolio: the ledger constructs it
/// under its own lock, so consumers never observe a partially-applied fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cash: Decimal,
    pub positions: Vec<PositionRecord>,
    pub total_value: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    /// Fractional return over initial capital.
    pub total_return: Decimal,
}

impl LedgerSnapshot {
    /// Quantity currently held in `symbol`, zero when flat.
    pub fn position_qty(&self, symbol: &str) -> u64 {
        self.positions
            .iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.qty)
            .unwrap_or(0)
    }
}

/// The externally visible order record, serialized for persistence/UI sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: Uuid,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: u64,
    pub kind: OrderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_qty: u64,
    pub avg_fill_price: Decimal,
    pub commission: Decimal,
    pub source_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            id: order.order_id,
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: order.quantity,
            kind: order.kind,
            limit_price: order.limit_price,
            status: order.status,
            filled_qty: order.filled_quantity,
            avg_fill_price: order.avg_fill_price,
            commission: order.commission,
            source_id: order.source.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// The externally visible fill record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub symbol: String,
    pub quantity: u64,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<&Fill> for FillRecord {
    fn from(fill: &Fill) -> Self {
        Self {
            id: fill.fill_id,
            order_id: fill.order_id,
            symbol: fill.symbol.clone(),
            quantity: fill.quantity,
            price: fill.price,
            commission: fill.commission,
            timestamp: fill.timestamp,
        }
    }
}

/// The externally visible risk verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictRecord {
    pub approved: bool,
    pub requested_quantity: u64,
    pub adjusted_quantity: u64,
    pub risk_score: f64,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&RiskVerdict> for VerdictRecord {
    fn from(verdict: &RiskVerdict) -> Self {
        Self {
            approved: verdict.approved,
            requested_quantity: verdict.requested_quantity,
            adjusted_quantity: verdict.adjusted_quantity,
            risk_score: verdict.risk_score,
            warnings: verdict.warnings.clone(),
            reason: verdict.reason.clone(),
        }
    }
}

/// The top-level event enum broadcast to external sinks.
///
/// The `#[serde(tag = "type", content = "payload")]` attribute serializes
/// each variant into a clean `{"type": ..., "payload": ...}` JSON object
/// that persistence and UI consumers can dispatch on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// The risk gate refused a decision outright.
    DecisionRejected {
        symbol: String,
        source: String,
        verdict: VerdictRecord,
    },
    /// An order changed state (submitted, filled, rejected, expired...).
    OrderUpdate(OrderRecord),
    /// A fill was applied to the ledger.
    FillApplied {
        fill: FillRecord,
        #[serde(skip_serializing_if = "Option::is_none")]
        realized_pnl: Option<Decimal>,
    },
    /// The ledger refused a fill on its defensive re-check.
    FillRejected { fill: FillRecord, reason: String },
    /// End-of-cycle portfolio state.
    CycleComplete(LedgerSnapshot),
}
