use crate::DecisionProducer;
use crate::error::ProducerError;
use async_trait::async_trait;
use configuration::ProducerConfig;
use core_types::{Decision, TradeAction};
use market_data::MarketSnapshot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// A mean-reversion producer.
///
/// It buys the steepest decliner of the cycle, betting the drop is an
/// overreaction. Because it wants entry below the already-depressed quote, it
/// posts a limit order a fraction under the market instead of paying the
/// spread with a market order.
pub struct Reversion {
    name: String,
    order_size: u64,
    threshold_pct: Decimal,
}

/// How far under the quote the entry limit is posted.
const LIMIT_DISCOUNT: Decimal = dec!(0.002);

impl Reversion {
    pub fn new(config: &ProducerConfig) -> Result<Self, ProducerError> {
        if config.order_size == 0 {
            return Err(ProducerError::InvalidParameters(
                "order_size must be greater than zero".to_string(),
            ));
        }
        if config.threshold_pct <= Decimal::ZERO {
            return Err(ProducerError::InvalidParameters(
                "threshold_pct must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            name: config.name.clone(),
            order_size: config.order_size,
            threshold_pct: config.threshold_pct,
        })
    }
}

#[async_trait]
impl DecisionProducer for Reversion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn produce(&self, snapshot: &MarketSnapshot) -> Result<Option<Decision>, ProducerError> {
        let Some(laggard) = snapshot
            .quotes
            .values()
            .min_by(|a, b| a.change_percent.cmp(&b.change_percent))
        else {
            return Ok(None);
        };

        if laggard.change_percent > -self.threshold_pct {
            return Ok(None);
        }

        let drop = -laggard.change_percent;
        let confidence = (drop / (self.threshold_pct * dec!(4))).min(Decimal::ONE);
        let limit = (laggard.price * (Decimal::ONE - LIMIT_DISCOUNT)).round_dp(2);
        Ok(Some(Decision {
            symbol: laggard.symbol.clone(),
            action: TradeAction::Buy,
            quantity: self.order_size,
            confidence,
            limit_price: Some(limit),
            stop_loss: None,
            take_profit: None,
            source: self.name.clone(),
            rationale: format!(
                "{} down {}% on the session, bidding {} for the bounce",
                laggard.symbol,
                (drop * dec!(100)).round_dp(2),
                limit
            ),
        }))
    }
}
