use crate::DecisionProducer;
use crate::error::ProducerError;
use async_trait::async_trait;
use configuration::ProducerConfig;
use core_types::{Decision, TradeAction};
use market_data::MarketSnapshot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// A trend-following producer.
///
/// It buys the strongest gainer of the cycle with a market order, on the
/// premise that intraday strength persists. Confidence scales with how far
/// the move exceeds the threshold.
pub struct Momentum {
    name: String,
    order_size: u64,
    threshold_pct: Decimal,
}

impl Momentum {
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
impl DecisionProducer for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    async fn produce(&self, snapshot: &MarketSnapshot) -> Result<Option<Decision>, ProducerError> {
        let Some(leader) = snapshot
            .quotes
            .values()
            .max_by(|a, b| a.change_percent.cmp(&b.change_percent))
        else {
            return Ok(None);
        };

        if leader.change_percent < self.threshold_pct {
            tracing::debug!(
                producer = %self.name,
                best = %leader.symbol,
                change = %leader.change_percent,
                "no mover above threshold"
            );
            return Ok(None);
        }

        let confidence = (leader.change_percent / (self.threshold_pct * dec!(4))).min(Decimal::ONE);
        Ok(Some(Decision {
            symbol: leader.symbol.clone(),
            action: TradeAction::Buy,
            quantity: self.order_size,
            confidence,
            limit_price: None,
            stop_loss: None,
            take_profit: None,
            source: self.name.clone(),
            rationale: format!(
                "{} up {}% on the session, strongest mover",
                leader.symbol,
                (leader.change_percent * dec!(100)).round_dp(2)
            ),
        }))
    }
}
