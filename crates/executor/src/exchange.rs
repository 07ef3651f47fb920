use crate::error::ExecutorError;
use chrono::{Duration as ChronoDuration, Utc};
use configuration::Simulation;
use core_types::{Decision, Fill, Order, OrderKind, OrderStatus, TradeAction};
use market_data::{Quote, QuoteSource};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing;

/// Calculates the commission for a fill.
///
/// The fee is per-share, capped at a fraction of the notional value, and never
/// below the exchange minimum. All amounts are rounded to cents.
pub fn commission(quantity: u64, price: Decimal, params: &Simulation) -> Decimal {
    let qty = Decimal::from(quantity);
    let per_share = qty * params.commission_per_share;
    let notional_cap = qty * price * params.commission_max_rate;
    per_share
        .min(notional_cap)
        .max(params.commission_min)
        .round_dp(2)
}

/// The "virtual exchange" that turns approved decisions into fills.
///
/// It is a pure calculator: it prices orders against live quotes, modeling
/// slippage and commission. It neither touches the ledger nor records fills
/// on the order: the caller settles the returned `Fill` against the ledger
/// first and records it on the order only once the ledger accepts, so an
/// order can never report a fill the account refused.
pub struct OrderExecutor {
    params: Simulation,
    quotes: Arc<dyn QuoteSource>,
    quote_timeout: Duration,
}

impl OrderExecutor {
    pub fn new(params: Simulation, quotes: Arc<dyn QuoteSource>, quote_timeout: Duration) -> Self {
        Self {
            params,
            quotes,
            quote_timeout,
        }
    }

    /// Builds a pending order from an approved decision, using the
    /// risk-adjusted quantity rather than the requested one.
    pub fn build_order(&self, decision: &Decision, quantity: u64) -> Order {
        Order::from_decision(decision, quantity)
    }

    /// Submits a pending order against the market.
    ///
    /// Market orders are priced immediately at the slippage-adjusted quote.
    /// Limit orders are priced at their limit when the quote crosses it, and
    /// otherwise remain `Submitted` awaiting re-evaluation on later cycles.
    /// A returned fill is prospective: the caller settles it against the
    /// ledger and only then records it on the order.
    ///
    /// If no quote can be obtained the order is rejected, since a market
    /// order with no reference price cannot be honestly simulated.
    pub async fn submit(&self, order: &mut Order) -> Result<Option<Fill>, ExecutorError> {
        order.submit();

        let quote = match self.fetch_quote(&order.symbol).await {
            Ok(quote) => quote,
            Err(err) => {
                order.reject()?;
                return Err(err);
            }
        };

        match order.kind {
            OrderKind::Market => {
                let fill_price = self.slippage_price(order.action, quote.price);
                Ok(Some(self.price_fill(order, fill_price)))
            }
            OrderKind::Limit => {
                if self.limit_crossed(order, quote.price) {
                    // Safe: a limit order always carries its limit price.
                    let limit = order.limit_price.unwrap_or(quote.price);
                    Ok(Some(self.price_fill(order, limit)))
                } else {
                    tracing::debug!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        quote = %quote.price,
                        limit = ?order.limit_price,
                        "limit order not crossed, resting"
                    );
                    Ok(None)
                }
            }
        }
    }

    /// Re-evaluates a resting limit order against the current market.
    ///
    /// Expiry is checked before pricing, so a stale order expires even when
    /// the market has since crossed its limit. A quote failure here leaves
    /// the order untouched to be retried next cycle.
    pub async fn reevaluate(&self, order: &mut Order) -> Result<Option<Fill>, ExecutorError> {
        if order.status != OrderStatus::Submitted || order.kind != OrderKind::Limit {
            return Ok(None);
        }

        let age = Utc::now() - order.created_at;
        if age >= ChronoDuration::seconds(self.params.limit_order_expiry_secs) {
            order.expire()?;
            tracing::info!(order_id = %order.order_id, symbol = %order.symbol, "limit order expired");
            return Ok(None);
        }

        let quote = self.fetch_quote(&order.symbol).await?;
        if self.limit_crossed(order, quote.price) {
            let limit = order.limit_price.unwrap_or(quote.price);
            return Ok(Some(self.price_fill(order, limit)));
        }
        Ok(None)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, ExecutorError> {
        match tokio::time::timeout(self.quote_timeout, self.quotes.quote(symbol)).await {
            Ok(Ok(quote)) => Ok(quote),
            Ok(Err(err)) => Err(ExecutorError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(ExecutorError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: format!("timed out after {:?}", self.quote_timeout),
            }),
        }
    }

    /// Moves the quote price against the taker by the configured slippage.
    fn slippage_price(&self, action: TradeAction, quote_price: Decimal) -> Decimal {
        let adjusted = match action {
            TradeAction::Buy => quote_price * (Decimal::ONE + self.params.slippage_pct),
            TradeAction::Sell => quote_price * (Decimal::ONE - self.params.slippage_pct),
            TradeAction::Hold => quote_price,
        };
        adjusted.round_dp(2)
    }

    fn limit_crossed(&self, order: &Order, quote_price: Decimal) -> bool {
        match (order.action, order.limit_price) {
            (TradeAction::Buy, Some(limit)) => quote_price <= limit,
            (TradeAction::Sell, Some(limit)) => quote_price >= limit,
            _ => false,
        }
    }

    /// Prices a prospective fill for the order's remaining quantity.
    ///
    /// The order is deliberately left untouched: it stays `Submitted` until
    /// the ledger has accepted the fill and the caller records it.
    fn price_fill(&self, order: &Order, price: Decimal) -> Fill {
        let quantity = order.remaining_quantity();
        let fee = commission(quantity, price, &self.params);
        tracing::debug!(
            order_id = %order.order_id,
            symbol = %order.symbol,
            quantity,
            price = %price,
            commission = %fee,
            "order priced"
        );
        Fill::new(order.order_id, order.symbol.clone(), quantity, price, fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use market_data::MarketDataError;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    struct StaticQuotes {
        prices: HashMap<String, Decimal>,
    }

    impl StaticQuotes {
        fn one(symbol: &str, price: Decimal) -> Arc<Self> {
            let mut prices = HashMap::new();
            prices.insert(symbol.to_string(), price);
            Arc::new(Self { prices })
        }
    }

    #[async_trait]
    impl QuoteSource for StaticQuotes {
        async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
            let price = self
                .prices
                .get(symbol)
                .copied()
                .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;
            Ok(Quote {
                symbol: symbol.to_string(),
                price,
                volume: 1_000,
                change_percent: Decimal::ZERO,
                timestamp: Utc::now(),
            })
        }
    }

    fn params() -> Simulation {
        Simulation {
            slippage_pct: dec!(0.001),
            commission_per_share: dec!(0.005),
            commission_min: dec!(1.0),
            commission_max_rate: dec!(0.005),
            limit_order_expiry_secs: 3600,
            quote_seed: 7,
        }
    }

    fn decision(symbol: &str, action: TradeAction, quantity: u64) -> Decision {
        Decision {
            symbol: symbol.to_string(),
            action,
            quantity,
            confidence: dec!(0.8),
            limit_price: None,
            stop_loss: None,
            take_profit: None,
            source: "test".to_string(),
            rationale: String::new(),
        }
    }

    #[test]
    fn commission_applies_minimum_floor() {
        // 10 shares at $150.15: per-share $0.05, cap $7.51, floor $1.00.
        assert_eq!(commission(10, dec!(150.15), &params()), dec!(1.00));
    }

    #[test]
    fn commission_per_share_dominates_for_large_orders() {
        // 5,000 shares at $100: per-share $25, cap $2,500.
        assert_eq!(commission(5_000, dec!(100), &params()), dec!(25.00));
    }

    #[test]
    fn commission_caps_at_notional_rate_for_penny_stocks() {
        // 5,000 shares at $0.40: per-share $25, cap 5000*0.40*0.005 = $10.
        assert_eq!(commission(5_000, dec!(0.40), &params()), dec!(10.00));
    }

    #[tokio::test]
    async fn market_buy_fills_with_adverse_slippage() {
        let executor = OrderExecutor::new(
            params(),
            StaticQuotes::one("AAPL", dec!(150)),
            Duration::from_secs(1),
        );
        let mut order = executor.build_order(&decision("AAPL", TradeAction::Buy, 10), 10);

        let fill = executor.submit(&mut order).await.unwrap().unwrap();
        assert_eq!(fill.price, dec!(150.15));
        assert_eq!(fill.commission, dec!(1.00));
        // Pricing leaves the order untouched until the ledger has settled.
        assert_eq!(order.status, OrderStatus::Submitted);

        order.record_fill(&fill);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_fill_price, dec!(150.15));
    }

    #[tokio::test]
    async fn market_sell_fills_below_quote() {
        let executor = OrderExecutor::new(
            params(),
            StaticQuotes::one("AAPL", dec!(160)),
            Duration::from_secs(1),
        );
        let mut order = executor.build_order(&decision("AAPL", TradeAction::Sell, 10), 10);

        let fill = executor.submit(&mut order).await.unwrap().unwrap();
        assert_eq!(fill.price, dec!(159.84));
    }

    #[tokio::test]
    async fn uncrossed_limit_buy_rests() {
        let executor = OrderExecutor::new(
            params(),
            StaticQuotes::one("MSFT", dec!(310)),
            Duration::from_secs(1),
        );
        let mut decision = decision("MSFT", TradeAction::Buy, 5);
        decision.limit_price = Some(dec!(300));
        let mut order = executor.build_order(&decision, 5);

        let fill = executor.submit(&mut order).await.unwrap();
        assert!(fill.is_none());
        assert_eq!(order.status, OrderStatus::Submitted);
    }

    #[tokio::test]
    async fn crossed_limit_buy_fills_at_limit() {
        let executor = OrderExecutor::new(
            params(),
            StaticQuotes::one("MSFT", dec!(295)),
            Duration::from_secs(1),
        );
        let mut decision = decision("MSFT", TradeAction::Buy, 5);
        decision.limit_price = Some(dec!(300));
        let mut order = executor.build_order(&decision, 5);

        let fill = executor.submit(&mut order).await.unwrap().unwrap();
        assert_eq!(fill.price, dec!(300));
        assert_eq!(order.status, OrderStatus::Submitted);
    }

    #[tokio::test]
    async fn stale_limit_order_expires_before_pricing() {
        let mut p = params();
        p.limit_order_expiry_secs = 0;
        let executor = OrderExecutor::new(
            p,
            // Quote crosses the limit, but expiry must win.
            StaticQuotes::one("MSFT", dec!(200)),
            Duration::from_secs(1),
        );
        let mut decision = decision("MSFT", TradeAction::Buy, 5);
        decision.limit_price = Some(dec!(300));
        let mut order = executor.build_order(&decision, 5);
        order.submit();

        let fill = executor.reevaluate(&mut order).await.unwrap();
        assert!(fill.is_none());
        assert_eq!(order.status, OrderStatus::Expired);
    }

    #[tokio::test]
    async fn missing_quote_rejects_the_order() {
        let executor = OrderExecutor::new(
            params(),
            StaticQuotes::one("AAPL", dec!(150)),
            Duration::from_secs(1),
        );
        let mut order = executor.build_order(&decision("ZZZZ", TradeAction::Buy, 1), 1);

        let result = executor.submit(&mut order).await;
        assert!(matches!(
            result,
            Err(ExecutorError::QuoteUnavailable { .. })
        ));
        assert_eq!(order.status, OrderStatus::Rejected);
    }
}
