use crate::error::RiskError;
use crate::{RiskContext, RiskGate};
use configuration::RiskPolicy;
use core_types::{Decision, RiskVerdict, TradeAction};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// The concrete risk gate driven by the `RiskPolicy` configuration section.
///
/// Checks run in a fixed order and each sees the quantity already reduced by
/// its predecessors:
///
/// 1. cash sufficiency (buys) — shrink or reject
/// 2. position-size cap (buys) — shrink or reject
/// 3. daily loss cap — veto for the whole decision
/// 4. concentration — warning + score
/// 5. correlation — warning + score
/// 6. volatility — warning + score
///
/// The surviving quantity is finally scaled down when the accumulated score
/// crosses 0.5, with a floor of one share.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    policy: RiskPolicy,
}

impl PolicyGate {
    /// Creates a new `PolicyGate`, validating that the policy fractions are
    /// logical before any decision is judged against them.
    pub fn new(policy: RiskPolicy) -> Result<Self, RiskError> {
        if policy.cash_buffer_pct < Decimal::ZERO || policy.cash_buffer_pct >= Decimal::ONE {
            return Err(RiskError::InvalidParameters(
                "cash_buffer_pct must be in [0, 1)".to_string(),
            ));
        }
        if policy.max_position_pct <= Decimal::ZERO || policy.max_position_pct > Decimal::ONE {
            return Err(RiskError::InvalidParameters(
                "max_position_pct must be in (0, 1]".to_string(),
            ));
        }
        if policy.max_daily_loss_pct <= Decimal::ZERO || policy.max_daily_loss_pct >= Decimal::ONE
        {
            return Err(RiskError::InvalidParameters(
                "max_daily_loss_pct must be in (0, 1)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&policy.correlation_threshold) {
            return Err(RiskError::InvalidParameters(
                "correlation_threshold must be in [0, 1]".to_string(),
            ));
        }
        if policy.volatility_threshold <= 0.0 {
            return Err(RiskError::InvalidParameters(
                "volatility_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(Self { policy })
    }
}

impl RiskGate for PolicyGate {
    fn evaluate(&self, decision: &Decision, ctx: &RiskContext) -> RiskVerdict {
        let requested = decision.quantity;

        // Non-executable decisions never reach the sizing checks.
        if decision.action == TradeAction::Hold {
            return RiskVerdict::reject(requested, "hold decisions are not executable");
        }
        if requested == 0 {
            return RiskVerdict::reject(requested, "requested quantity is zero");
        }
        if ctx.estimated_price <= Decimal::ZERO {
            return RiskVerdict::reject(
                requested,
                format!("estimated price {} is not positive", ctx.estimated_price),
            );
        }

        let mut quantity = requested;
        let mut warnings: Vec<String> = Vec::new();
        let mut risk_score = 0.0_f64;
        let price = ctx.estimated_price;

        // --- 1. Cash sufficiency (buys only) ---
        if decision.action == TradeAction::Buy {
            let unit_cost = price * (Decimal::ONE + self.policy.cash_buffer_pct);
            let required = unit_cost * Decimal::from(quantity);
            if required > ctx.snapshot.cash {
                let max_quantity = (ctx.snapshot.cash / unit_cost)
                    .floor()
                    .to_u64()
                    .unwrap_or(0);
                if max_quantity == 0 {
                    return RiskVerdict::reject(
                        requested,
                        format!(
                            "insufficient funds: need ${:.2}, have ${:.2}",
                            required, ctx.snapshot.cash
                        ),
                    );
                }
                warnings.push(format!(
                    "insufficient funds, quantity reduced {} -> {}",
                    quantity, max_quantity
                ));
                quantity = max_quantity;
            }
        }

        // --- 2. Position-size cap (never shrinks sells) ---
        if decision.action == TradeAction::Buy && ctx.snapshot.total_value > Decimal::ZERO {
            let current_qty = ctx.snapshot.position_qty(&decision.symbol);
            let post_trade_value = Decimal::from(current_qty + quantity) * price;
            let weight = post_trade_value / ctx.snapshot.total_value;
            if weight > self.policy.max_position_pct {
                let max_value = ctx.snapshot.total_value * self.policy.max_position_pct;
                let max_total = (max_value / price).floor().to_u64().unwrap_or(0);
                let capped = max_total.saturating_sub(current_qty);
                if capped == 0 {
                    return RiskVerdict::reject(
                        requested,
                        format!(
                            "position cap exceeded: {} already at or above {:.1}% of portfolio",
                            decision.symbol,
                            self.policy.max_position_pct * dec!(100)
                        ),
                    );
                }
                warnings.push(format!(
                    "position cap: weight {:.1}% > {:.1}%, quantity reduced {} -> {}",
                    weight * dec!(100),
                    self.policy.max_position_pct * dec!(100),
                    quantity,
                    capped
                ));
                risk_score += self.policy.weights.position_cap;
                quantity = capped;
            }
        }

        // --- 3. Daily loss cap (vetoes the whole decision) ---
        let negative_unrealized = ctx.snapshot.unrealized_pnl.min(Decimal::ZERO);
        let daily_pnl = ctx.realized_pnl_today + negative_unrealized;
        let max_loss = ctx.initial_capital * self.policy.max_daily_loss_pct;
        if daily_pnl < Decimal::ZERO {
            let loss = -daily_pnl;
            if loss > max_loss {
                return RiskVerdict::reject(
                    requested,
                    format!("daily loss limit exceeded: ${:.2} > ${:.2}", loss, max_loss),
                );
            }
            if loss > max_loss * dec!(0.8) {
                warnings.push(format!(
                    "approaching daily loss limit: ${:.2} / ${:.2}",
                    loss, max_loss
                ));
            }
        }

        // --- 4. Concentration (informational) ---
        if ctx.snapshot.positions.len() < self.policy.min_distinct_positions {
            warnings.push(format!(
                "portfolio holds only {} positions; diversification recommended",
                ctx.snapshot.positions.len()
            ));
            risk_score += self.policy.weights.concentration;
        }

        // --- 5. Correlation (informational) ---
        let correlated = ctx
            .snapshot
            .positions
            .iter()
            .filter(|p| p.symbol != decision.symbol)
            .filter(|p| {
                ctx.stats.correlation(&decision.symbol, &p.symbol)
                    > self.policy.correlation_threshold
            })
            .count();
        if correlated > self.policy.max_correlated_positions {
            warnings.push(format!(
                "{} is highly correlated (>{:.0}%) with {} existing positions",
                decision.symbol,
                self.policy.correlation_threshold * 100.0,
                correlated
            ));
            risk_score += self.policy.weights.correlation;
        }

        // --- 6. Volatility (informational) ---
        let volatility = ctx.stats.volatility(&decision.symbol);
        if volatility > self.policy.volatility_threshold {
            warnings.push(format!(
                "{} volatility is elevated: {:.0}% annualized",
                decision.symbol,
                volatility * 100.0
            ));
            risk_score += self.policy.weights.volatility;
        }

        // --- Final risk-adjusted sizing ---
        if risk_score > 0.5 {
            let factor = (1.0 - risk_score).max(0.5);
            quantity = ((quantity as f64) * factor).floor() as u64;
        }
        quantity = quantity.max(1);

        RiskVerdict::approve(requested, quantity, risk_score, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RiskContext;
    use chrono::Utc;
    use configuration::RiskWeights;
    use events::{LedgerSnapshot, PositionRecord};
    use market_data::MarketStats;

    struct FixedStats {
        correlation: f64,
        volatility: f64,
    }

    impl MarketStats for FixedStats {
        fn correlation(&self, _: &str, _: &str) -> f64 {
            self.correlation
        }
        fn volatility(&self, _: &str) -> f64 {
            self.volatility
        }
    }

    const CALM: FixedStats = FixedStats {
        correlation: 0.1,
        volatility: 0.2,
    };

    fn policy() -> RiskPolicy {
        RiskPolicy {
            cash_buffer_pct: dec!(0.01),
            max_position_pct: dec!(0.1),
            max_daily_loss_pct: dec!(0.05),
            correlation_threshold: 0.7,
            max_correlated_positions: 3,
            min_distinct_positions: 5,
            volatility_threshold: 0.4,
            weights: RiskWeights {
                position_cap: 0.3,
                concentration: 0.2,
                correlation: 0.2,
                volatility: 0.1,
            },
        }
    }

    fn snapshot(cash: Decimal, positions: Vec<PositionRecord>) -> LedgerSnapshot {
        let positions_value: Decimal = positions
            .iter()
            .map(|p| Decimal::from(p.qty) * p.current_price)
            .sum();
        LedgerSnapshot {
            timestamp: Utc::now(),
            cash,
            total_value: cash + positions_value,
            positions,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            total_return: Decimal::ZERO,
        }
    }

    fn position(symbol: &str, qty: u64, price: Decimal) -> PositionRecord {
        PositionRecord {
            symbol: symbol.to_string(),
            qty,
            avg_cost: price,
            current_price: price,
        }
    }

    fn buy(symbol: &str, quantity: u64) -> Decision {
        Decision {
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            quantity,
            confidence: dec!(0.9),
            limit_price: None,
            stop_loss: None,
            take_profit: None,
            source: "test".to_string(),
            rationale: String::new(),
        }
    }

    fn ctx<'a>(
        snapshot: &'a LedgerSnapshot,
        price: Decimal,
        stats: &'a dyn MarketStats,
    ) -> RiskContext<'a> {
        RiskContext {
            snapshot,
            estimated_price: price,
            initial_capital: dec!(10000),
            realized_pnl_today: Decimal::ZERO,
            stats,
        }
    }

    #[test]
    fn cash_shrink_respects_buffered_budget() {
        // Neutralize the position cap so only the cash check bites.
        let mut p = policy();
        p.max_position_pct = Decimal::ONE;
        let gate = PolicyGate::new(p).unwrap();

        let snap = snapshot(dec!(1000), Vec::new());
        let verdict = gate.evaluate(&buy("AAPL", 100), &ctx(&snap, dec!(20), &CALM));

        assert!(verdict.approved);
        // floor(1000 / (20 * 1.01)) = 49
        assert_eq!(verdict.adjusted_quantity, 49);
        let cost = Decimal::from(verdict.adjusted_quantity) * dec!(20) * dec!(1.01);
        assert!(cost <= snap.cash, "buffered cost {} exceeds cash", cost);
    }

    #[test]
    fn unaffordable_single_share_is_rejected() {
        let gate = PolicyGate::new(policy()).unwrap();
        let snap = snapshot(dec!(10), Vec::new());
        let verdict = gate.evaluate(&buy("AAPL", 5), &ctx(&snap, dec!(150), &CALM));
        assert!(!verdict.approved);
        assert!(verdict.reason.as_deref().unwrap().contains("insufficient"));
    }

    #[test]
    fn position_cap_shrinks_buy_to_exact_weight() {
        let gate = PolicyGate::new(policy()).unwrap();
        // $10,000 portfolio, no holdings: a $1,500 buy is 15% > 10%.
        let snap = snapshot(dec!(10000), Vec::new());
        let verdict = gate.evaluate(&buy("MSFT", 100), &ctx(&snap, dec!(15), &CALM));

        assert!(verdict.approved);
        // floor(10000 * 0.1 / 15) = 66 shares, exactly at the cap.
        assert_eq!(verdict.adjusted_quantity, 66);
        assert!(verdict.risk_score > 0.0);
    }

    #[test]
    fn cap_already_exceeded_pre_trade_rejects() {
        let gate = PolicyGate::new(policy()).unwrap();
        // TSLA already 12% of a $10,000 portfolio (60 shares @ $20 = $1,200).
        let snap = snapshot(dec!(8800), vec![position("TSLA", 60, dec!(20))]);
        let verdict = gate.evaluate(&buy("TSLA", 10), &ctx(&snap, dec!(20), &CALM));

        assert!(!verdict.approved);
        assert!(verdict.reason.as_deref().unwrap().contains("position cap"));
    }

    #[test]
    fn sells_are_never_shrunk_by_the_cap() {
        let gate = PolicyGate::new(policy()).unwrap();
        let snap = snapshot(dec!(100), vec![position("TSLA", 500, dec!(20))]);
        let mut decision = buy("TSLA", 400);
        decision.action = TradeAction::Sell;
        let verdict = gate.evaluate(&decision, &ctx(&snap, dec!(20), &CALM));
        assert!(verdict.approved);
        assert_eq!(verdict.adjusted_quantity, 400);
    }

    #[test]
    fn daily_loss_cap_vetoes_everything() {
        let gate = PolicyGate::new(policy()).unwrap();
        let snap = snapshot(dec!(10000), Vec::new());
        let mut context = ctx(&snap, dec!(20), &CALM);
        // Cap is 10000 * 5% = $500; we are down $600 today.
        context.realized_pnl_today = dec!(-600);

        let verdict = gate.evaluate(&buy("AAPL", 1), &context);
        assert!(!verdict.approved);
        assert!(verdict.reason.as_deref().unwrap().contains("daily loss"));
    }

    #[test]
    fn near_limit_daily_loss_only_warns() {
        let gate = PolicyGate::new(policy()).unwrap();
        let snap = snapshot(dec!(10000), Vec::new());
        let mut context = ctx(&snap, dec!(20), &CALM);
        context.realized_pnl_today = dec!(-450); // 90% of the $500 cap

        let verdict = gate.evaluate(&buy("AAPL", 1), &context);
        assert!(verdict.approved);
        assert!(verdict
            .warnings
            .iter()
            .any(|w| w.contains("approaching daily loss limit")));
    }

    #[test]
    fn negative_unrealized_pnl_counts_toward_the_cap() {
        let gate = PolicyGate::new(policy()).unwrap();
        let mut snap = snapshot(dec!(10000), Vec::new());
        snap.unrealized_pnl = dec!(-400);
        let mut context = ctx(&snap, dec!(20), &CALM);
        context.realized_pnl_today = dec!(-200); // total loss $600 > $500

        let verdict = gate.evaluate(&buy("AAPL", 1), &context);
        assert!(!verdict.approved);
    }

    #[test]
    fn sparse_portfolio_flags_concentration() {
        let gate = PolicyGate::new(policy()).unwrap();
        let snap = snapshot(dec!(10000), vec![position("AAPL", 1, dec!(150))]);
        let verdict = gate.evaluate(&buy("MSFT", 1), &ctx(&snap, dec!(300), &CALM));
        assert!(verdict.approved);
        assert!(verdict.warnings.iter().any(|w| w.contains("positions")));
        assert!((verdict.risk_score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn high_correlation_with_many_holdings_flags() {
        let hot = FixedStats {
            correlation: 0.9,
            volatility: 0.2,
        };
        let gate = PolicyGate::new(policy()).unwrap();
        let snap = snapshot(
            dec!(100000),
            vec![
                position("A", 1, dec!(10)),
                position("B", 1, dec!(10)),
                position("C", 1, dec!(10)),
                position("D", 1, dec!(10)),
                position("E", 1, dec!(10)),
            ],
        );
        let verdict = gate.evaluate(&buy("AAPL", 1), &ctx(&snap, dec!(10), &hot));
        assert!(verdict.approved);
        assert!(verdict.warnings.iter().any(|w| w.contains("correlated")));
    }

    #[test]
    fn risk_score_above_half_scales_quantity_down() {
        let wild = FixedStats {
            correlation: 0.9,
            volatility: 0.6,
        };
        let gate = PolicyGate::new(policy()).unwrap();
        // Concentration (0.2) + correlation (0.2) fires only with enough
        // correlated holdings; build four tiny ones. Volatility adds 0.1 and
        // the cap breach adds 0.3 for a 0.8 total -> factor max(0.5, 0.2).
        let snap = snapshot(
            dec!(10000),
            vec![
                position("A", 1, dec!(1)),
                position("B", 1, dec!(1)),
                position("C", 1, dec!(1)),
                position("D", 1, dec!(1)),
            ],
        );
        // 200 shares @ $15 = $3,000 on a ~$10,004 book: cap shrinks to 66.
        let verdict = gate.evaluate(&buy("NVDA", 200), &ctx(&snap, dec!(15), &wild));
        assert!(verdict.approved);
        assert!((verdict.risk_score - 0.8).abs() < 1e-9);
        // 66 scaled by the 0.5 floor.
        assert_eq!(verdict.adjusted_quantity, 33);
        assert_eq!(verdict.requested_quantity, 200);
    }

    #[test]
    fn zero_quantity_and_hold_are_rejected() {
        let gate = PolicyGate::new(policy()).unwrap();
        let snap = snapshot(dec!(10000), Vec::new());
        let context = ctx(&snap, dec!(20), &CALM);

        assert!(!gate.evaluate(&buy("AAPL", 0), &context).approved);

        let mut hold = buy("AAPL", 10);
        hold.action = TradeAction::Hold;
        assert!(!gate.evaluate(&hold, &context).approved);
    }

    #[test]
    fn invalid_policy_is_refused_at_construction() {
        let mut p = policy();
        p.max_daily_loss_pct = dec!(1.5);
        assert!(PolicyGate::new(p).is_err());
    }
}
