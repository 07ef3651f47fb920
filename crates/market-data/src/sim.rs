use crate::error::MarketDataError;
use crate::{MarketStats, Quote, QuoteSource};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

/// A deterministic (seeded) random-walk market.
///
/// Each quote perturbs the previous price by up to +/-2%. Correlation and
/// volatility figures are drawn once at construction from the same seed, so
/// two instances built with identical inputs always agree.
pub struct SimulatedMarket {
    reference_prices: HashMap<String, Decimal>,
    correlations: HashMap<(String, String), f64>,
    volatilities: HashMap<String, f64>,
    state: Mutex<WalkState>,
}

struct WalkState {
    rng: StdRng,
    last_prices: HashMap<String, Decimal>,
}

impl SimulatedMarket {
    pub fn new(reference_prices: HashMap<String, Decimal>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let symbols: Vec<&String> = {
            let mut s: Vec<&String> = reference_prices.keys().collect();
            // Stable iteration order so the seeded draws are reproducible.
            s.sort();
            s
        };

        let mut correlations = HashMap::new();
        for a in &symbols {
            for b in &symbols {
                if a != b {
                    let c: f64 = rng.gen_range(-0.5..0.8);
                    correlations.insert(((*a).clone(), (*b).clone()), c);
                }
            }
        }

        let mut volatilities = HashMap::new();
        for symbol in &symbols {
            volatilities.insert((*symbol).clone(), rng.gen_range(0.15..0.6));
        }

        let last_prices = reference_prices.clone();
        Self {
            reference_prices,
            correlations,
            volatilities,
            state: Mutex::new(WalkState { rng, last_prices }),
        }
    }
}

#[async_trait]
impl QuoteSource for SimulatedMarket {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let reference = *self
            .reference_prices
            .get(symbol)
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;

        let mut state = self
            .state
            .lock()
            .expect("simulated market state lock poisoned");

        let last = *state.last_prices.get(symbol).unwrap_or(&reference);
        let drift: f64 = state.rng.gen_range(-0.02..0.02);
        let factor = Decimal::from_f64(1.0 + drift)
            .ok_or_else(|| MarketDataError::Unavailable(symbol.to_string(), "bad drift".into()))?;
        let price = (last * factor).round_dp(2);
        state.last_prices.insert(symbol.to_string(), price);

        let volume = state.rng.gen_range(100_000..5_000_000);
        let change_percent = if reference.is_zero() {
            Decimal::ZERO
        } else {
            ((price - reference) / reference).round_dp(6)
        };

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            volume,
            change_percent,
            timestamp: Utc::now(),
        })
    }
}

impl MarketStats for SimulatedMarket {
    fn correlation(&self, a: &str, b: &str) -> f64 {
        self.correlations
            .get(&(a.to_string(), b.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    fn volatility(&self, symbol: &str) -> f64 {
        self.volatilities.get(symbol).copied().unwrap_or(0.3)
    }
}
