use chrono::NaiveTime;
use core_types::ProducerId;
use rust_decimal::Decimal;
use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineSettings,
    pub session: Session,
    pub risk_policy: RiskPolicy,
    pub simulation: Simulation,
    pub ledger: LedgerSettings,
    pub producers: Vec<ProducerConfig>,
}

/// Scheduler-level parameters: capital, cadence, and collaborator timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// The starting capital the ledger is created with.
    pub initial_capital: Decimal,
    /// Seconds between trading cycles.
    pub trading_interval_secs: u64,
    /// How long to wait for any single decision producer before discarding
    /// its contribution for this cycle.
    pub producer_timeout_ms: u64,
    /// How long to wait for a single quote before treating it as unavailable.
    pub quote_timeout_ms: u64,
    /// The universe of symbols the engine quotes and trades.
    pub symbols: Vec<String>,
}

/// Trading-session parameters.
///
/// The UTC offset here is load-bearing twice over: it bounds the trading
/// window, and local midnight in this offset is the boundary of the
/// daily-loss window used by the risk gate.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Fixed offset from UTC, in hours (e.g. -5 for US Eastern standard time).
    pub utc_offset_hours: i32,
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// When false the engine trades around the clock (useful for demos and
    /// tests); the daily-loss boundary still applies.
    pub enforce_hours: bool,
}

/// Parameters for the risk gate's checks, applied in the documented order.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskPolicy {
    /// Extra cash headroom required on buys (0.01 = 1%).
    pub cash_buffer_pct: Decimal,
    /// Maximum post-trade position value as a fraction of total portfolio
    /// value (0.1 = 10%).
    pub max_position_pct: Decimal,
    /// Maximum daily loss as a fraction of initial capital (0.05 = 5%).
    pub max_daily_loss_pct: Decimal,
    /// Pairwise correlation above which two holdings count as correlated.
    pub correlation_threshold: f64,
    /// How many highly correlated holdings are tolerated before flagging.
    pub max_correlated_positions: usize,
    /// Fewer distinct positions than this flags concentration risk.
    pub min_distinct_positions: usize,
    /// Annualized volatility above which a symbol is flagged (0.4 = 40%).
    pub volatility_threshold: f64,
    pub weights: RiskWeights,
}

/// Risk-score increments contributed by each flagging check.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskWeights {
    pub position_cap: f64,
    pub concentration: f64,
    pub correlation: f64,
    pub volatility: f64,
}

/// Parameters for the simulated execution venue.
#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    /// The assumed adverse price movement applied to market-order fills
    /// (0.001 = 0.1%: buys fill higher, sells fill lower).
    pub slippage_pct: Decimal,
    /// Commission model: clamp(qty * per_share, min, qty * price * max_rate).
    /// This is the single commission formula for the whole system.
    pub commission_per_share: Decimal,
    pub commission_min: Decimal,
    pub commission_max_rate: Decimal,
    /// Standing limit orders older than this are expired.
    pub limit_order_expiry_secs: i64,
    /// Seed for the simulated quote source's random walk.
    pub quote_seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    /// Upper bound on retained trade records; the oldest are dropped first.
    pub max_trade_history: usize,
}

/// One decision producer to run each cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    pub id: ProducerId,
    pub name: String,
    pub enabled: bool,
    /// Base order size, in shares, for decisions this producer emits.
    pub order_size: u64,
    /// Minimum absolute fractional session move (0.02 = 2%) before the
    /// producer acts.
    pub threshold_pct: Decimal,
}
