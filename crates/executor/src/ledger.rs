use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use core_types::{Fill, Position, TradeAction, TradeRecord};
use events::LedgerSnapshot;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// The outcome of applying a fill to the ledger.
#[derive(Debug, Clone)]
pub struct AppliedFill {
    /// The position after the fill, or `None` when it was fully closed.
    pub position: Option<Position>,
    /// Realized profit or loss, present only for sells.
    pub realized_pnl: Option<Decimal>,
}

/// The single source of truth for the trading account.
///
/// Tracks cash, open positions, and the trade history. It only ever changes
/// through `apply_fill` and `mark_prices`, and it validates every fill again
/// at settlement time, even ones the risk gate already approved, because the
/// account may have changed between approval and execution.
#[derive(Debug, Clone)]
pub struct Ledger {
    initial_capital: Decimal,
    cash: Decimal,
    positions: HashMap<String, Position>,
    realized_pnl: Decimal,
    trades: VecDeque<TradeRecord>,
    max_history: usize,
}

impl Ledger {
    pub fn new(initial_capital: Decimal, max_history: usize) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            realized_pnl: Decimal::ZERO,
            trades: VecDeque::new(),
            max_history,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Settles a fill against the account.
    ///
    /// Buys re-check cash including commission; sells require an open
    /// position with enough shares. A rejected fill leaves the ledger
    /// completely untouched.
    pub fn apply_fill(
        &mut self,
        action: TradeAction,
        fill: &Fill,
        source: &str,
        rationale: &str,
    ) -> Result<AppliedFill, ExecutorError> {
        let quantity = Decimal::from(fill.quantity);
        let notional = fill.price * quantity;

        let applied = match action {
            TradeAction::Buy => {
                let cost = notional + fill.commission;
                if cost > self.cash {
                    return Err(ExecutorError::InsufficientFunds {
                        required: cost.to_string(),
                        available: self.cash.to_string(),
                    });
                }
                self.cash -= cost;

                let position = self
                    .positions
                    .entry(fill.symbol.clone())
                    .or_insert_with(|| Position {
                        symbol: fill.symbol.clone(),
                        quantity: 0,
                        avg_cost: Decimal::ZERO,
                        current_price: fill.price,
                        last_updated: fill.timestamp,
                    });

                let existing_value = position.avg_cost * Decimal::from(position.quantity);
                let total_quantity = position.quantity + fill.quantity;
                position.avg_cost = (existing_value + notional) / Decimal::from(total_quantity);
                position.quantity = total_quantity;
                position.current_price = fill.price;
                position.last_updated = fill.timestamp;

                AppliedFill {
                    position: Some(position.clone()),
                    realized_pnl: None,
                }
            }
            TradeAction::Sell => {
                let position = self
                    .positions
                    .get_mut(&fill.symbol)
                    .ok_or_else(|| ExecutorError::PositionNotFound(fill.symbol.clone()))?;
                if fill.quantity > position.quantity {
                    return Err(ExecutorError::InsufficientQuantity {
                        requested: fill.quantity,
                        available: position.quantity,
                    });
                }

                let realized = (fill.price - position.avg_cost) * quantity - fill.commission;
                self.cash += notional - fill.commission;
                self.realized_pnl += realized;
                position.quantity -= fill.quantity;
                position.current_price = fill.price;
                position.last_updated = fill.timestamp;

                let remaining = if position.quantity == 0 {
                    self.positions.remove(&fill.symbol);
                    None
                } else {
                    Some(position.clone())
                };

                AppliedFill {
                    position: remaining,
                    realized_pnl: Some(realized),
                }
            }
            // Holds never produce fills; nothing to settle.
            TradeAction::Hold => {
                return Ok(AppliedFill {
                    position: self.positions.get(&fill.symbol).cloned(),
                    realized_pnl: None,
                });
            }
        };

        self.record_trade(action, fill, source, rationale, applied.realized_pnl);
        Ok(applied)
    }

    /// Marks open positions to the latest quoted prices.
    pub fn mark_prices(&mut self, prices: &HashMap<String, Decimal>) {
        let now = Utc::now();
        for position in self.positions.values_mut() {
            if let Some(price) = prices.get(&position.symbol) {
                position.current_price = *price;
                position.last_updated = now;
            }
        }
    }

    /// Produces a point-in-time view of the account for risk checks and the
    /// event stream.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let positions_value: Decimal = self.positions.values().map(|p| p.market_value()).sum();
        let unrealized_pnl: Decimal = self.positions.values().map(|p| p.unrealized_pnl()).sum();
        let total_value = self.cash + positions_value;
        let total_return = if self.initial_capital > Decimal::ZERO {
            (total_value - self.initial_capital) / self.initial_capital
        } else {
            Decimal::ZERO
        };

        LedgerSnapshot {
            timestamp: Utc::now(),
            cash: self.cash,
            positions: self.positions.values().map(Into::into).collect(),
            total_value,
            realized_pnl: self.realized_pnl,
            unrealized_pnl,
            total_return,
        }
    }

    /// Pages through the trade history, newest first.
    pub fn history(&self, offset: usize, limit: usize) -> Vec<TradeRecord> {
        self.trades
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sums realized P&L for trades at or after the given boundary. Used for
    /// the daily loss accounting, which resets at the session boundary.
    pub fn realized_pnl_since(&self, boundary: DateTime<Utc>) -> Decimal {
        self.trades
            .iter()
            .rev()
            .take_while(|t| t.timestamp >= boundary)
            .filter_map(|t| t.realized_pnl)
            .sum()
    }

    fn record_trade(
        &mut self,
        action: TradeAction,
        fill: &Fill,
        source: &str,
        rationale: &str,
        realized_pnl: Option<Decimal>,
    ) {
        self.trades.push_back(TradeRecord {
            timestamp: fill.timestamp,
            symbol: fill.symbol.clone(),
            action,
            quantity: fill.quantity,
            price: fill.price,
            commission: fill.commission,
            realized_pnl,
            source: source.to_string(),
            rationale: rationale.to_string(),
        });
        while self.trades.len() > self.max_history {
            self.trades.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fill(symbol: &str, quantity: u64, price: Decimal, commission: Decimal) -> Fill {
        Fill::new(Uuid::new_v4(), symbol.to_string(), quantity, price, commission)
    }

    /// A position map entry with zero quantity or negative cash is ledger
    /// corruption, not a recoverable error.
    fn assert_invariants(ledger: &Ledger) {
        assert!(ledger.cash() >= Decimal::ZERO, "cash went negative");
        assert!(
            ledger.positions().all(|p| p.quantity > 0),
            "zero-quantity position left in the map"
        );
    }

    fn buy(ledger: &mut Ledger, symbol: &str, quantity: u64, price: Decimal, fee: Decimal) {
        ledger
            .apply_fill(TradeAction::Buy, &fill(symbol, quantity, price, fee), "test", "")
            .unwrap();
    }

    #[test]
    fn buy_debits_cash_and_opens_position() {
        let mut ledger = Ledger::new(dec!(10000), 100);
        buy(&mut ledger, "AAPL", 10, dec!(150.15), dec!(1.00));

        assert_eq!(ledger.cash(), dec!(8497.50));
        let position = ledger.position("AAPL").unwrap();
        assert_eq!(position.quantity, 10);
        assert_eq!(position.avg_cost, dec!(150.15));
    }

    #[test]
    fn sell_realizes_pnl_net_of_commission() {
        let mut ledger = Ledger::new(dec!(10000), 100);
        buy(&mut ledger, "AAPL", 10, dec!(150.15), dec!(1.00));

        let applied = ledger
            .apply_fill(
                TradeAction::Sell,
                &fill("AAPL", 10, dec!(159.84), dec!(1.00)),
                "test",
                "",
            )
            .unwrap();

        // (159.84 - 150.15) * 10 - 1.00
        assert_eq!(applied.realized_pnl, Some(dec!(95.90)));
        assert!(applied.position.is_none());
        assert!(ledger.position("AAPL").is_none());
        assert_eq!(ledger.realized_pnl(), dec!(95.90));
        assert_invariants(&ledger);
    }

    #[test]
    fn round_trip_conserves_cash_minus_commissions() {
        let mut ledger = Ledger::new(dec!(10000), 100);
        buy(&mut ledger, "AAPL", 10, dec!(150), dec!(1.00));
        ledger
            .apply_fill(
                TradeAction::Sell,
                &fill("AAPL", 10, dec!(150), dec!(1.00)),
                "test",
                "",
            )
            .unwrap();

        assert_eq!(ledger.cash(), dec!(9998.00));
    }

    #[test]
    fn repeated_buys_average_the_cost_basis() {
        let mut ledger = Ledger::new(dec!(100000), 100);
        buy(&mut ledger, "MSFT", 4, dec!(300), dec!(1.00));
        buy(&mut ledger, "MSFT", 6, dec!(290), dec!(1.00));

        let position = ledger.position("MSFT").unwrap();
        assert_eq!(position.quantity, 10);
        assert_eq!(position.avg_cost, dec!(294));
    }

    #[test]
    fn unaffordable_buy_is_rejected_without_mutation() {
        let mut ledger = Ledger::new(dec!(100), 100);
        let result = ledger.apply_fill(
            TradeAction::Buy,
            &fill("AAPL", 10, dec!(150), dec!(1.00)),
            "test",
            "",
        );

        assert!(matches!(result, Err(ExecutorError::InsufficientFunds { .. })));
        assert_eq!(ledger.cash(), dec!(100));
        assert_eq!(ledger.trade_count(), 0);
        assert_invariants(&ledger);
    }

    #[test]
    fn selling_more_than_held_is_rejected() {
        let mut ledger = Ledger::new(dec!(10000), 100);
        buy(&mut ledger, "AAPL", 5, dec!(150), dec!(1.00));

        let result = ledger.apply_fill(
            TradeAction::Sell,
            &fill("AAPL", 6, dec!(150), dec!(1.00)),
            "test",
            "",
        );
        assert!(matches!(
            result,
            Err(ExecutorError::InsufficientQuantity {
                requested: 6,
                available: 5
            })
        ));
        assert_eq!(ledger.position("AAPL").unwrap().quantity, 5);
    }

    #[test]
    fn selling_with_no_position_is_rejected() {
        let mut ledger = Ledger::new(dec!(10000), 100);
        let result = ledger.apply_fill(
            TradeAction::Sell,
            &fill("TSLA", 1, dec!(200), dec!(1.00)),
            "test",
            "",
        );
        assert!(matches!(result, Err(ExecutorError::PositionNotFound(_))));
    }

    #[test]
    fn snapshot_reflects_marked_prices() {
        let mut ledger = Ledger::new(dec!(10000), 100);
        buy(&mut ledger, "AAPL", 10, dec!(150), dec!(1.00));

        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), dec!(160));
        ledger.mark_prices(&prices);

        let snapshot = ledger.snapshot();
        // 10000 - 1500 - 1 + 10 * 160
        assert_eq!(snapshot.total_value, dec!(10099));
        assert_eq!(snapshot.unrealized_pnl, dec!(100));
        assert_eq!(snapshot.position_qty("AAPL"), 10);
    }

    #[test]
    fn trade_history_is_bounded_and_newest_first() {
        let mut ledger = Ledger::new(dec!(1000000), 3);
        for price in [dec!(10), dec!(11), dec!(12), dec!(13)] {
            buy(&mut ledger, "AAPL", 1, price, dec!(1.00));
        }

        assert_eq!(ledger.trade_count(), 3);
        let page = ledger.history(0, 2);
        assert_eq!(page[0].price, dec!(13));
        assert_eq!(page[1].price, dec!(12));
        // The oldest trade fell off the front.
        assert!(ledger.history(0, 10).iter().all(|t| t.price > dec!(10)));
    }

    #[test]
    fn realized_pnl_since_only_counts_recent_sells() {
        let mut ledger = Ledger::new(dec!(10000), 100);
        let boundary = Utc::now();
        buy(&mut ledger, "AAPL", 10, dec!(150), dec!(1.00));
        ledger
            .apply_fill(
                TradeAction::Sell,
                &fill("AAPL", 10, dec!(140), dec!(1.00)),
                "test",
                "",
            )
            .unwrap();

        // (140 - 150) * 10 - 1 = -101
        assert_eq!(ledger.realized_pnl_since(boundary), dec!(-101));

        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(ledger.realized_pnl_since(future), Decimal::ZERO);
    }
}
