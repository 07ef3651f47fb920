//! # Trading Engine
//!
//! The central orchestrator of the decision-to-ledger pipeline. Each cycle
//! the engine snapshots the market, re-evaluates resting limit orders, fans
//! the snapshot out to all decision producers concurrently, and then routes
//! every arriving decision through the risk gate, the executor, and the
//! ledger.
//!
//! ## Architectural Principles
//!
//! - **Concurrent reads, serialized writes.** Quote fetches and producer
//!   polls run concurrently, but decisions are applied one at a time and
//!   every risk evaluation sees a ledger snapshot that already includes the
//!   fills of the decisions processed before it. Two simultaneous buys can
//!   therefore never spend the same cash twice.
//! - **Unreliable periphery.** A producer or quote source that errors or
//!   hangs costs the engine one timeout, never the cycle. Order of arrival
//!   is the configured producer order, so a cycle's outcome is deterministic
//!   given the same quotes and decisions.

pub use crate::error::EngineError;
pub use crate::store::OrderStore;
use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use configuration::{Config, Session};
use core_types::{Decision, Fill, OrderStatus, TradeAction};
use events::{EngineEvent, FillRecord, OrderRecord, VerdictRecord};
use executor::{Ledger, OrderExecutor};
use futures::future::join_all;
use market_data::{MarketSnapshot, MarketStats, QuoteSource};
use producers::{DecisionProducer, create_producer};
use risk::{PolicyGate, RiskContext, RiskGate};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, warn};

pub mod error;
pub mod store;

/// Counters summarizing one trading cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Decisions the producers emitted this cycle.
    pub decisions: usize,
    /// Fills settled into the ledger (including resting orders that crossed).
    pub filled: usize,
    /// Decisions or fills refused by the gate, the executor, or the ledger.
    pub rejected: usize,
    /// Limit orders left resting for future cycles.
    pub rested: usize,
    /// Resting limit orders that aged out this cycle.
    pub expired: usize,
}

/// The central orchestrator for the trading pipeline.
pub struct TradingEngine {
    config: Config,
    gate: PolicyGate,
    executor: OrderExecutor,
    quotes: Arc<dyn QuoteSource>,
    stats: Arc<dyn MarketStats>,
    producers: Vec<Arc<dyn DecisionProducer>>,
    ledger: Arc<Mutex<Ledger>>,
    orders: OrderStore,
    events: broadcast::Sender<EngineEvent>,
}

impl TradingEngine {
    /// Builds an engine with producers constructed from the configuration.
    pub fn new(
        config: Config,
        quotes: Arc<dyn QuoteSource>,
        stats: Arc<dyn MarketStats>,
    ) -> Result<Self, EngineError> {
        let producers = config
            .producers
            .iter()
            .filter(|p| p.enabled)
            .map(create_producer)
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_producers(config, quotes, stats, producers)
    }

    /// Builds an engine around an explicit producer set. Used directly when
    /// the caller wants producers the factory does not know about.
    pub fn with_producers(
        config: Config,
        quotes: Arc<dyn QuoteSource>,
        stats: Arc<dyn MarketStats>,
        producers: Vec<Arc<dyn DecisionProducer>>,
    ) -> Result<Self, EngineError> {
        if config.engine.symbols.is_empty() {
            return Err(EngineError::Configuration(
                "no symbols configured".to_string(),
            ));
        }
        let gate = PolicyGate::new(config.risk_policy.clone())?;
        let executor = OrderExecutor::new(
            config.simulation.clone(),
            Arc::clone(&quotes),
            Duration::from_millis(config.engine.quote_timeout_ms),
        );
        let ledger = Arc::new(Mutex::new(Ledger::new(
            config.engine.initial_capital,
            config.ledger.max_trade_history,
        )));
        let orders = OrderStore::new(config.ledger.max_trade_history);
        let (events, _) = broadcast::channel(256);

        Ok(Self {
            config,
            gate,
            executor,
            quotes,
            stats,
            producers,
            ledger,
            orders,
            events,
        })
    }

    /// Subscribes to the engine's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// A handle to the shared ledger, for reporting outside the cycle loop.
    pub fn ledger(&self) -> Arc<Mutex<Ledger>> {
        Arc::clone(&self.ledger)
    }

    /// Pages through the order history, newest first.
    pub fn orders(&self, offset: usize, limit: usize) -> Vec<OrderRecord> {
        self.orders.page(offset, limit)
    }

    /// The main trading loop. Ticks at the configured interval and runs one
    /// cycle per tick, skipping ticks outside the trading session when
    /// session hours are enforced. Runs until the task is cancelled.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        info!(
            producers = self.producers.len(),
            symbols = self.config.engine.symbols.len(),
            interval_secs = self.config.engine.trading_interval_secs,
            "engine starting"
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(
            self.config.engine.trading_interval_secs,
        ));
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if self.config.session.enforce_hours && !in_session(&self.config.session, now) {
                debug!("outside trading session, skipping cycle");
                continue;
            }
            match self.run_cycle().await {
                Ok(report) => info!(?report, "cycle complete"),
                Err(err) => error!(%err, "cycle failed"),
            }
        }
    }

    /// Executes a single trading cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, EngineError> {
        let snapshot = self.collect_snapshot().await;
        if snapshot.quotes.is_empty() {
            warn!("no quotes available, skipping cycle");
            return Ok(CycleReport::default());
        }

        {
            let prices: HashMap<String, _> = snapshot
                .quotes
                .iter()
                .map(|(symbol, quote)| (symbol.clone(), quote.price))
                .collect();
            self.ledger.lock().await.mark_prices(&prices);
        }

        let mut report = CycleReport::default();
        self.reevaluate_resting_orders(&mut report).await;

        let decisions = self.collect_decisions(&snapshot).await;
        report.decisions = decisions.len();
        for decision in decisions {
            self.process_decision(decision, &snapshot, &mut report)
                .await;
        }

        let final_snapshot = self.ledger.lock().await.snapshot();
        self.emit(EngineEvent::CycleComplete(final_snapshot));
        Ok(report)
    }

    /// Fetches quotes for all configured symbols concurrently. A symbol whose
    /// quote fails or times out is simply absent from the snapshot.
    async fn collect_snapshot(&self) -> MarketSnapshot {
        let timeout = Duration::from_millis(self.config.engine.quote_timeout_ms);
        let fetches = self.config.engine.symbols.iter().map(|symbol| {
            let quotes = Arc::clone(&self.quotes);
            let symbol = symbol.clone();
            async move {
                match tokio::time::timeout(timeout, quotes.quote(&symbol)).await {
                    Ok(Ok(quote)) => Some((symbol, quote)),
                    Ok(Err(err)) => {
                        warn!(%symbol, %err, "quote fetch failed");
                        None
                    }
                    Err(_) => {
                        warn!(%symbol, "quote fetch timed out");
                        None
                    }
                }
            }
        });
        let quotes: HashMap<_, _> = join_all(fetches).await.into_iter().flatten().collect();
        let sentiment = aggregate_sentiment(&quotes);
        MarketSnapshot {
            quotes,
            sentiment,
            taken_at: Some(Utc::now()),
        }
    }

    /// Polls every producer concurrently, each under its own timeout. The
    /// returned order is the configured producer order regardless of which
    /// finished first, so cycle outcomes are reproducible.
    async fn collect_decisions(&self, snapshot: &MarketSnapshot) -> Vec<Decision> {
        let timeout = Duration::from_millis(self.config.engine.producer_timeout_ms);
        let polls = self.producers.iter().map(|producer| {
            let producer = Arc::clone(producer);
            async move {
                match tokio::time::timeout(timeout, producer.produce(snapshot)).await {
                    Ok(Ok(decision)) => decision,
                    Ok(Err(err)) => {
                        warn!(producer = producer.name(), %err, "producer failed");
                        None
                    }
                    Err(_) => {
                        warn!(producer = producer.name(), "producer timed out");
                        None
                    }
                }
            }
        });
        join_all(polls).await.into_iter().flatten().collect()
    }

    /// Gives every resting limit order another look at the market.
    async fn reevaluate_resting_orders(&mut self, report: &mut CycleReport) {
        for mut order in self.orders.take_open() {
            match self.executor.reevaluate(&mut order).await {
                Ok(Some(fill)) => {
                    if self
                        .settle_fill(order.action, &fill, &order.source, &order.rationale)
                        .await
                    {
                        order.record_fill(&fill);
                        info!(
                            order_id = %order.order_id,
                            symbol = %order.symbol,
                            quantity = fill.quantity,
                            price = %fill.price,
                            "resting order filled"
                        );
                        report.filled += 1;
                    } else {
                        // Still `Submitted` here, so the transition cannot fail.
                        let _ = order.reject();
                        report.rejected += 1;
                    }
                    self.emit(EngineEvent::OrderUpdate(OrderRecord::from(&order)));
                }
                Ok(None) => {
                    if order.status == OrderStatus::Expired {
                        report.expired += 1;
                        self.emit(EngineEvent::OrderUpdate(OrderRecord::from(&order)));
                    }
                }
                // The order is untouched and will be retried next cycle.
                Err(err) => warn!(order_id = %order.order_id, %err, "re-evaluation failed"),
            }
            self.orders.insert(order);
        }
    }

    /// Routes one decision through the gate, the executor, and the ledger.
    ///
    /// Decisions are processed strictly one at a time; the ledger snapshot
    /// taken here already reflects every fill from earlier in the cycle.
    async fn process_decision(
        &mut self,
        decision: Decision,
        snapshot: &MarketSnapshot,
        report: &mut CycleReport,
    ) {
        if decision.action == TradeAction::Hold {
            debug!(symbol = %decision.symbol, source = %decision.source, "hold decision, skipping");
            return;
        }
        let Some(estimated_price) = snapshot.price(&decision.symbol).or(decision.limit_price)
        else {
            warn!(
                symbol = %decision.symbol,
                source = %decision.source,
                "no price reference for decision, dropping"
            );
            return;
        };

        let (ledger_snapshot, realized_today) = {
            let ledger = self.ledger.lock().await;
            let boundary = session_boundary(self.config.session.utc_offset_hours, Utc::now());
            (ledger.snapshot(), ledger.realized_pnl_since(boundary))
        };
        let ctx = RiskContext {
            snapshot: &ledger_snapshot,
            estimated_price,
            initial_capital: self.config.engine.initial_capital,
            realized_pnl_today: realized_today,
            stats: self.stats.as_ref(),
        };
        let verdict = self.gate.evaluate(&decision, &ctx);
        if !verdict.approved {
            info!(
                symbol = %decision.symbol,
                source = %decision.source,
                reason = verdict.reason.as_deref().unwrap_or("unspecified"),
                "decision rejected by risk gate"
            );
            report.rejected += 1;
            self.emit(EngineEvent::DecisionRejected {
                symbol: decision.symbol.clone(),
                source: decision.source.clone(),
                verdict: VerdictRecord::from(&verdict),
            });
            return;
        }
        if verdict.adjusted_quantity < verdict.requested_quantity {
            info!(
                symbol = %decision.symbol,
                requested = verdict.requested_quantity,
                adjusted = verdict.adjusted_quantity,
                "risk gate reduced order size"
            );
        }

        let mut order = self.executor.build_order(&decision, verdict.adjusted_quantity);
        match self.executor.submit(&mut order).await {
            Ok(Some(fill)) => {
                if self
                    .settle_fill(order.action, &fill, &decision.source, &decision.rationale)
                    .await
                {
                    order.record_fill(&fill);
                    info!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        quantity = fill.quantity,
                        price = %fill.price,
                        "order filled"
                    );
                    report.filled += 1;
                } else {
                    // Still `Submitted` here, so the transition cannot fail.
                    let _ = order.reject();
                    report.rejected += 1;
                }
            }
            Ok(None) => {
                report.rested += 1;
            }
            Err(err) => {
                warn!(symbol = %decision.symbol, %err, "order submission failed");
                report.rejected += 1;
            }
        }
        self.emit(EngineEvent::OrderUpdate(OrderRecord::from(&order)));
        self.orders.insert(order);
    }

    /// Applies a fill to the ledger under the lock. The ledger may still
    /// refuse the fill; that refusal is surfaced as a `FillRejected` event,
    /// not an engine error, because the cycle must go on.
    async fn settle_fill(
        &self,
        action: TradeAction,
        fill: &Fill,
        source: &str,
        rationale: &str,
    ) -> bool {
        let result = {
            let mut ledger = self.ledger.lock().await;
            ledger.apply_fill(action, fill, source, rationale)
        };
        match result {
            Ok(applied) => {
                self.emit(EngineEvent::FillApplied {
                    fill: FillRecord::from(fill),
                    realized_pnl: applied.realized_pnl,
                });
                true
            }
            Err(err) => {
                warn!(symbol = %fill.symbol, %err, "ledger refused fill");
                self.emit(EngineEvent::FillRejected {
                    fill: FillRecord::from(fill),
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is a normal condition, not an error.
        let _ = self.events.send(event);
    }
}

/// Derives an aggregate sentiment figure from the session moves, clamped to
/// `[-1, 1]`. A 5% average move saturates the scale.
fn aggregate_sentiment(quotes: &HashMap<String, market_data::Quote>) -> f64 {
    if quotes.is_empty() {
        return 0.0;
    }
    let mean: f64 = quotes
        .values()
        .filter_map(|q| q.change_percent.to_f64())
        .sum::<f64>()
        / quotes.len() as f64;
    (mean / 0.05).clamp(-1.0, 1.0)
}

/// The most recent local midnight in the configured session timezone,
/// expressed in UTC. Daily loss accounting resets at this instant.
fn session_boundary(utc_offset_hours: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = utc_offset_hours.clamp(-23, 23) * 3600;
    let offset = FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix());
    let local_midnight = now.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    local_midnight
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Whether `now` falls inside the configured session window. Windows that
/// wrap midnight (open after close) are supported.
fn in_session(session: &Session, now: DateTime<Utc>) -> bool {
    let secs = session.utc_offset_hours.clamp(-23, 23) * 3600;
    let offset = FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix());
    let local = now.with_timezone(&offset).time();
    if session.open <= session.close {
        local >= session.open && local < session.close
    } else {
        local >= session.open || local < session.close
    }
}
