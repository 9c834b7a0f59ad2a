//! The auto-trade orchestrator.
//!
//! Suggestions are handled strictly one at a time through `&mut self`, so the
//! dedup cache, rate window, pending queue and history never need locks. Book
//! fetches and order placement are the only suspension points.

use polymarket_core::api::{MarketData, OrderGateway};
use polymarket_core::types::{OrderRequest, OrderSide, TradeSuggestion};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::{AutoTradeConfig, ExecutionStyle, SweepConfig, SweepEngine, TradeMode};
use super::history::{HistoryEntry, HistoryOutcome, RecentLog, SkipReason};
use super::pending::{PendingState, PendingTrade, TradeSizing};
use crate::burst::{BurstParams, BurstSweeper};
use crate::clock::Clock;
use crate::dedup::DedupCache;
use crate::error::{AutoTradeError, Result};
use crate::paper_store::{PaperStore, PaperTradeRecord, PAPER_HISTORY_CAP};
use crate::rate_limit::HourlyRateWindow;
use crate::sequential::SequentialSweeper;
use crate::simulator::{simulate_sweep, SimulationParams};
use crate::sweep::{submit_and_track, StopReason, SweepParams, SweepResult};

pub const HISTORY_CAP: usize = 500;
pub const PENDING_CAP: usize = 500;

/// Copy-style limit prices never exceed this.
const MAX_COPY_PRICE: Decimal = Decimal::from_parts(99, 0, 0, false, 2);

const MIN_FILL_NOT_MET: &str = "min_fill_not_met";

/// A suggestion that passed policy and validation.
struct Ready {
    token_id: String,
    sizing: TradeSizing,
}

/// Result of one live execution, copy or sweep.
struct LiveOutcome {
    order_id: Option<String>,
    filled_usd: Decimal,
    result: Option<SweepResult>,
    error: Option<String>,
}

impl LiveOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            order_id: None,
            filled_usd: Decimal::ZERO,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Point-in-time summary for dashboards and health checks.
#[derive(Debug, Clone, Serialize)]
pub struct AutoTradeStatus {
    pub enabled: bool,
    pub mode: TradeMode,
    pub style: ExecutionStyle,
    pub paper_enabled: bool,
    pub live_ready: bool,
    pub counters: BTreeMap<&'static str, u64>,
    pub allow_conditions: usize,
    pub deny_conditions: usize,
    pub allow_categories: usize,
    pub pending_open: usize,
    pub pending_total: usize,
    pub history_len: usize,
    pub orders_last_hour: usize,
    pub max_orders_per_hour: u32,
    pub last_error: Option<String>,
    pub paper_trades: usize,
    pub paper_filled_usd: Decimal,
    pub paper_persist_error: Option<String>,
}

pub struct AutoTrader {
    config: Arc<AutoTradeConfig>,
    market: Arc<dyn MarketData>,
    gateway: Option<Arc<dyn OrderGateway>>,
    clock: Arc<dyn Clock>,
    dedup: DedupCache,
    rate_window: HourlyRateWindow,
    pending: RecentLog<PendingTrade>,
    history: RecentLog<HistoryEntry>,
    paper: RecentLog<PaperTradeRecord>,
    paper_store: Option<PaperStore>,
    counters: BTreeMap<&'static str, u64>,
    last_error: Option<String>,
}

impl AutoTrader {
    /// Start disabled with the default configuration and no live gateway.
    pub fn new(market: Arc<dyn MarketData>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(AutoTradeConfig::default()),
            market,
            gateway: None,
            clock,
            dedup: DedupCache::new(),
            rate_window: HourlyRateWindow::new(),
            pending: RecentLog::new(PENDING_CAP),
            history: RecentLog::new(HISTORY_CAP),
            paper: RecentLog::new(PAPER_HISTORY_CAP),
            paper_store: None,
            counters: BTreeMap::new(),
            last_error: None,
        }
    }

    /// Install the credentialed order gateway used for live trading.
    pub fn with_gateway(mut self, gateway: Arc<dyn OrderGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Attach persistence and seed paper history with previously saved records.
    pub fn with_paper_store(mut self, store: PaperStore, records: Vec<PaperTradeRecord>) -> Self {
        self.paper = RecentLog::from_newest_first(records, PAPER_HISTORY_CAP);
        self.paper_store = Some(store);
        self
    }

    pub fn config(&self) -> &AutoTradeConfig {
        &self.config
    }

    /// Replace the configuration wholesale. Rejected updates change nothing.
    pub fn update_config(&mut self, config: AutoTradeConfig) -> Result<()> {
        let config = config.sanitized();
        if config.requires_credential() && self.gateway.is_none() {
            warn!("Rejected config update: live auto mode without an order gateway");
            return Err(AutoTradeError::LiveWithoutCredential);
        }

        info!(
            enabled = config.enabled,
            mode = ?config.mode,
            style = ?config.style,
            paper = config.paper.enabled,
            max_orders_per_hour = config.max_orders_per_hour,
            "Auto-trade config updated"
        );
        self.config = Arc::new(config);
        Ok(())
    }

    pub fn can_execute_now(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.rate_window.can_execute(now, self.config.max_orders_per_hour)
    }

    /// Drain `rx` in arrival order until every sender is dropped.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<TradeSuggestion>) {
        while let Some(suggestion) = rx.recv().await {
            self.process(suggestion).await;
        }
        info!("Suggestion stream closed");
    }

    /// Handle one suggestion. Returns the history entry it produced, or `None`
    /// when auto-trading is off or the suggestion was handled recently.
    pub async fn process(&mut self, suggestion: TradeSuggestion) -> Option<HistoryEntry> {
        let now = self.clock.now_ms();
        let config = self.config.clone();

        if !config.enabled {
            debug!(suggestion_id = %suggestion.id, "Auto-trade disabled, ignoring suggestion");
            return None;
        }
        if self.dedup.is_handled(&suggestion.id, now) {
            self.bump("deduped");
            debug!(suggestion_id = %suggestion.id, "Suggestion already handled");
            return None;
        }

        let outcome = match self.prepare(&suggestion, &config).await {
            Ok(ready) => self.dispatch(&suggestion, &config, ready, now).await,
            Err(outcome) => outcome,
        };

        self.dedup.mark(suggestion.id.clone(), now, outcome.dedup_ttl_ms());
        let entry = HistoryEntry {
            at_ms: now,
            suggestion_id: suggestion.id,
            condition_id: suggestion.condition_id,
            token_id: suggestion.token_id,
            style: config.style,
            outcome,
        };
        self.record(entry.clone());
        Some(entry)
    }

    /// Policy, validation and sizing. `Err` carries the outcome to record.
    async fn prepare(
        &self,
        suggestion: &TradeSuggestion,
        config: &AutoTradeConfig,
    ) -> std::result::Result<Ready, HistoryOutcome> {
        let skip = |reason| HistoryOutcome::Skipped {
            reason,
            pending_id: None,
        };

        if config.is_denied(suggestion) {
            return Err(skip(SkipReason::Denied));
        }
        if !config.is_allowed(suggestion) {
            return Err(skip(SkipReason::NotAllowed));
        }
        if suggestion.side != Some(OrderSide::Buy) {
            return Err(skip(SkipReason::SideNotSupported));
        }

        let token_id = suggestion
            .token_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| skip(SkipReason::MissingTokenId))?
            .to_string();
        let leader_price = suggestion
            .leader_price
            .filter(|p| *p > Decimal::ZERO && *p < Decimal::ONE)
            .ok_or_else(|| skip(SkipReason::BadPrice))?;

        let sizing = match config.style {
            ExecutionStyle::Copy => {
                let amount_usd = suggestion
                    .sized_amount
                    .filter(|a| *a > Decimal::ZERO)
                    .ok_or_else(|| skip(SkipReason::ZeroSize))?;
                TradeSizing {
                    amount_usd,
                    price_cap: (leader_price + config.price_buffer).min(MAX_COPY_PRICE),
                    leader_price,
                }
            }
            ExecutionStyle::Sweep => {
                if config.sweep.budget_usd <= Decimal::ZERO {
                    return Err(skip(SkipReason::ZeroBudget));
                }
                if config.sweep.trigger_price > Decimal::ZERO {
                    let book = self.market.get_order_book(&token_id).await.map_err(|e| {
                        HistoryOutcome::Failed {
                            error: format!("book fetch failed: {e}"),
                        }
                    })?;
                    let reached = book
                        .best_ask()
                        .is_some_and(|ask| ask >= config.sweep.trigger_price);
                    if !reached {
                        return Err(skip(SkipReason::BelowTrigger));
                    }
                }
                TradeSizing {
                    amount_usd: config.sweep.budget_usd,
                    price_cap: config.sweep.price_cap,
                    leader_price,
                }
            }
        };

        Ok(Ready { token_id, sizing })
    }

    async fn dispatch(
        &mut self,
        suggestion: &TradeSuggestion,
        config: &AutoTradeConfig,
        ready: Ready,
        now: i64,
    ) -> HistoryOutcome {
        if config.paper.enabled {
            return self.paper_trade(suggestion, config, &ready, now).await;
        }

        match config.mode {
            TradeMode::Queue => {
                let pending_id = self.enqueue(suggestion, config, &ready, now, PendingState::Pending);
                info!(
                    suggestion_id = %suggestion.id,
                    pending_id = %pending_id,
                    amount_usd = %ready.sizing.amount_usd,
                    "Queued trade for approval"
                );
                HistoryOutcome::Queued { pending_id }
            }
            TradeMode::Auto => {
                if !self.rate_window.can_execute(now, config.max_orders_per_hour) {
                    let state = PendingState::Skipped {
                        resolved_at_ms: now,
                        reason: SkipReason::RateLimited.to_string(),
                    };
                    let pending_id = self.enqueue(suggestion, config, &ready, now, state);
                    warn!(
                        suggestion_id = %suggestion.id,
                        limit = config.max_orders_per_hour,
                        "Hourly order limit reached, trade skipped"
                    );
                    return HistoryOutcome::Skipped {
                        reason: SkipReason::RateLimited,
                        pending_id: Some(pending_id),
                    };
                }

                let live = self
                    .execute_live(config.style, &ready.token_id, &ready.sizing, &config.sweep)
                    .await;
                self.live_history_outcome(live)
            }
        }
    }

    async fn paper_trade(
        &mut self,
        suggestion: &TradeSuggestion,
        config: &AutoTradeConfig,
        ready: &Ready,
        now: i64,
    ) -> HistoryOutcome {
        let book = match self.market.get_order_book(&ready.token_id).await {
            Ok(book) => book,
            Err(e) => {
                let error = format!("book fetch failed: {e}");
                warn!(token_id = %ready.token_id, error = %error, "[PAPER] Cannot simulate");
                self.last_error = Some(error.clone());
                return HistoryOutcome::Failed { error };
            }
        };

        let result = simulate_sweep(
            &book.asks,
            &SimulationParams {
                price_cap: ready.sizing.price_cap,
                budget_usd: ready.sizing.amount_usd,
                max_levels: config.paper.simulated_levels(),
                at_ms: now,
            },
        );
        let error = if result.fill_pct() < config.paper.min_fill_pct {
            Some(MIN_FILL_NOT_MET.to_string())
        } else {
            result.error.clone()
        };

        let record = PaperTradeRecord {
            id: Uuid::new_v4(),
            created_at_ms: now,
            suggestion_id: suggestion.id.clone(),
            condition_id: suggestion.condition_id.clone(),
            token_id: ready.token_id.clone(),
            title: suggestion.title.clone(),
            category: suggestion.category.clone(),
            fill_rule: config.paper.fill_rule,
            leader_price: Some(ready.sizing.leader_price),
            result,
            error: error.clone(),
        };

        info!(
            suggestion_id = %suggestion.id,
            token_id = %ready.token_id,
            price_cap = %ready.sizing.price_cap,
            budget_usd = %ready.sizing.amount_usd,
            filled_usd = %record.result.total_filled_usd,
            stop_reason = %record.result.stop_reason,
            "[PAPER] Simulated sweep"
        );

        let outcome = HistoryOutcome::Paper {
            paper_id: record.id,
            filled_usd: record.result.total_filled_usd,
            stop_reason: record.result.stop_reason,
            error,
        };
        self.paper.push(record);
        if let Some(store) = &self.paper_store {
            store.schedule(self.paper.to_vec());
        }
        outcome
    }

    fn enqueue(
        &mut self,
        suggestion: &TradeSuggestion,
        config: &AutoTradeConfig,
        ready: &Ready,
        now: i64,
        state: PendingState,
    ) -> Uuid {
        let trade = PendingTrade {
            id: Uuid::new_v4(),
            created_at_ms: now,
            suggestion_id: suggestion.id.clone(),
            condition_id: suggestion.condition_id.clone(),
            token_id: ready.token_id.clone(),
            title: suggestion.title.clone(),
            sizing: ready.sizing,
            style: config.style,
            sweep: (config.style == ExecutionStyle::Sweep).then(|| config.sweep.clone()),
            state,
            result: None,
        };
        let id = trade.id;
        self.pending.push(trade);
        id
    }

    /// Place a copy order or run a sweep. Records one rate-window slot per
    /// order that observed a fill.
    async fn execute_live(
        &mut self,
        style: ExecutionStyle,
        token_id: &str,
        sizing: &TradeSizing,
        sweep: &SweepConfig,
    ) -> LiveOutcome {
        let Some(gateway) = self.gateway.clone() else {
            return LiveOutcome::failed(AutoTradeError::NoGateway.to_string());
        };
        let poll = sweep.poll_config();

        match style {
            ExecutionStyle::Copy => {
                let request = OrderRequest::buy(token_id, sizing.amount_usd, sizing.price_cap);
                let entry =
                    submit_and_track(gateway.as_ref(), self.clock.as_ref(), &request, &poll).await;

                // An unknown fill counts rather than under-counts.
                if entry.has_fill() || entry.fill_unknown() {
                    self.rate_window.record(entry.submitted_at_ms);
                }
                if !entry.success {
                    return LiveOutcome::failed(
                        entry.error_msg.unwrap_or_else(|| "order rejected".to_string()),
                    );
                }
                if !entry.fill_unknown() && !entry.has_fill() {
                    warn!(
                        token_id = %token_id,
                        order_id = ?entry.order_id,
                        status = ?entry.order_status,
                        "Copy order closed without a fill"
                    );
                    return LiveOutcome::failed(StopReason::NoFill.to_string());
                }

                info!(
                    token_id = %token_id,
                    order_id = ?entry.order_id,
                    price_cap = %sizing.price_cap,
                    filled_usd = %entry.filled_usd(),
                    "Copy order executed"
                );
                LiveOutcome {
                    filled_usd: entry.filled_usd(),
                    order_id: entry.order_id,
                    result: None,
                    error: None,
                }
            }
            ExecutionStyle::Sweep => {
                let params = SweepParams {
                    token_id: token_id.to_string(),
                    price_cap: sizing.price_cap,
                    budget_usd: sizing.amount_usd,
                    max_orders: sweep.max_orders,
                    max_levels: sweep.max_levels,
                    order_interval: sweep.interval(),
                };

                let result = match sweep.engine {
                    SweepEngine::Sequential => {
                        SequentialSweeper::new(self.market.clone(), gateway, self.clock.clone())
                            .with_poll_config(poll)
                            .run(&params)
                            .await
                    }
                    SweepEngine::Burst => {
                        let mut burst = BurstParams::new(params);
                        burst.concurrency = sweep.concurrency;
                        burst.max_rounds = sweep.max_rounds;
                        burst.window = sweep.window_ms.map(Duration::from_millis);
                        burst.orders_per_round = sweep.orders_per_round;
                        BurstSweeper::new(self.market.clone(), gateway, self.clock.clone())
                            .with_poll_config(poll)
                            .run(&burst)
                            .await
                    }
                };

                for order in result.orders.iter().filter(|o| o.has_fill()) {
                    self.rate_window.record(order.submitted_at_ms);
                }

                let failure = result.stop_reason.is_failure().then(|| {
                    result
                        .error
                        .clone()
                        .unwrap_or_else(|| result.stop_reason.to_string())
                });
                // A partial fill stays executed but still reports why it stopped.
                let error = match failure {
                    Some(error) if result.total_filled_usd > Decimal::ZERO => {
                        warn!(
                            token_id = %token_id,
                            filled_usd = %result.total_filled_usd,
                            stop_reason = %result.stop_reason,
                            error = %error,
                            "Sweep stopped early after a partial fill"
                        );
                        self.last_error = Some(error);
                        None
                    }
                    other => other,
                };
                LiveOutcome {
                    order_id: result.orders.iter().rev().find_map(|o| o.order_id.clone()),
                    filled_usd: result.total_filled_usd,
                    error,
                    result: Some(result),
                }
            }
        }
    }

    fn live_history_outcome(&mut self, live: LiveOutcome) -> HistoryOutcome {
        match live.error {
            Some(error) => {
                self.last_error = Some(error.clone());
                HistoryOutcome::Failed { error }
            }
            None => HistoryOutcome::Executed {
                order_id: live.order_id,
                filled_usd: live.filled_usd,
                stop_reason: live.result.map(|r| r.stop_reason),
            },
        }
    }

    /// Approve a queued trade and execute it now.
    ///
    /// Fails without side effects when the trade is not open, no gateway is
    /// installed, or the hourly window is full.
    pub async fn execute_pending(&mut self, id: Uuid) -> Result<PendingTrade> {
        let now = self.clock.now_ms();
        let trade = self.open_pending(id)?.clone();
        if self.gateway.is_none() {
            return Err(AutoTradeError::NoGateway);
        }
        let limit = self.config.max_orders_per_hour;
        if !self.rate_window.can_execute(now, limit) {
            return Err(AutoTradeError::RateLimited(limit));
        }

        let sweep = trade
            .sweep
            .clone()
            .unwrap_or_else(|| self.config.sweep.clone());
        let live = self
            .execute_live(trade.style, &trade.token_id, &trade.sizing, &sweep)
            .await;
        let resolved_at_ms = self.clock.now_ms();

        let state = match &live.error {
            Some(error) => PendingState::Failed {
                resolved_at_ms,
                error: error.clone(),
            },
            None => PendingState::Executed {
                resolved_at_ms,
                order_id: live.order_id.clone(),
                filled_usd: live.filled_usd,
            },
        };
        let result = live.result.clone();
        let outcome = self.live_history_outcome(live);

        let slot = self
            .pending
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AutoTradeError::PendingNotFound(id.to_string()))?;
        slot.resolve(state)?;
        slot.result = result;
        let resolved = slot.clone();

        info!(pending_id = %id, status = resolved.state.as_str(), "Pending trade executed");
        self.record(HistoryEntry {
            at_ms: resolved_at_ms,
            suggestion_id: resolved.suggestion_id.clone(),
            condition_id: resolved.condition_id.clone(),
            token_id: Some(resolved.token_id.clone()),
            style: resolved.style,
            outcome,
        });
        Ok(resolved)
    }

    /// Resolve a queued trade as skipped.
    pub fn skip_pending(&mut self, id: Uuid, reason: impl Into<String>) -> Result<PendingTrade> {
        let resolved_at_ms = self.clock.now_ms();
        self.open_pending(id)?;
        let slot = self
            .pending
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AutoTradeError::PendingNotFound(id.to_string()))?;
        slot.resolve(PendingState::Skipped {
            resolved_at_ms,
            reason: reason.into(),
        })?;
        info!(pending_id = %id, "Pending trade skipped");
        Ok(slot.clone())
    }

    fn open_pending(&self, id: Uuid) -> Result<&PendingTrade> {
        let trade = self
            .pending
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AutoTradeError::PendingNotFound(id.to_string()))?;
        if !trade.is_open() {
            return Err(AutoTradeError::PendingNotOpen {
                id: id.to_string(),
                state: trade.state.as_str().to_string(),
            });
        }
        Ok(trade)
    }

    fn record(&mut self, entry: HistoryEntry) {
        self.bump(entry.outcome.label());
        debug!(
            suggestion_id = %entry.suggestion_id,
            outcome = entry.outcome.label(),
            "Auto-trade decision recorded"
        );
        self.history.push(entry);
    }

    fn bump(&mut self, key: &'static str) {
        *self.counters.entry(key).or_insert(0) += 1;
    }

    pub fn pending(&self, id: Uuid) -> Option<&PendingTrade> {
        self.pending.iter().find(|p| p.id == id)
    }

    pub fn recent_pending(&self, limit: usize) -> Vec<PendingTrade> {
        self.pending.recent(limit)
    }

    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.recent(limit)
    }

    pub fn recent_paper(&self, limit: usize) -> Vec<PaperTradeRecord> {
        self.paper.recent(limit)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn status(&mut self) -> AutoTradeStatus {
        let now = self.clock.now_ms();
        self.dedup.purge_expired(now);
        let config = &self.config;

        AutoTradeStatus {
            enabled: config.enabled,
            mode: config.mode,
            style: config.style,
            paper_enabled: config.paper.enabled,
            live_ready: self.gateway.is_some(),
            counters: self.counters.clone(),
            allow_conditions: config.allow_conditions.len(),
            deny_conditions: config.deny_conditions.len(),
            allow_categories: config.allow_categories.len(),
            pending_open: self.pending.iter().filter(|p| p.is_open()).count(),
            pending_total: self.pending.len(),
            history_len: self.history.len(),
            orders_last_hour: self.rate_window.count(now),
            max_orders_per_hour: config.max_orders_per_hour,
            last_error: self.last_error.clone(),
            paper_trades: self.paper.len(),
            paper_filled_usd: self.paper.iter().map(|r| r.result.total_filled_usd).sum(),
            paper_persist_error: self.paper_store.as_ref().and_then(|s| s.last_error()),
        }
    }

    /// Drain pending paper-history writes and stop the background writer.
    pub async fn shutdown(&self) {
        if let Some(store) = &self.paper_store {
            store.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::RATE_WINDOW_MS;
    use async_trait::async_trait;
    use polymarket_core::types::{OrderBook, OrderSnapshot, OrderStatus, PlaceOrderResponse, PriceLevel};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn d(v: i64, scale: u32) -> Decimal {
        Decimal::new(v, scale)
    }

    struct StaticBook(Vec<PriceLevel>);

    #[async_trait]
    impl MarketData for StaticBook {
        async fn get_order_book(&self, token_id: &str) -> polymarket_core::Result<OrderBook> {
            let mut book = OrderBook::empty(token_id);
            book.asks = self.0.clone();
            Ok(book)
        }
    }

    /// Fills every order in full at its price cap. Placements from
    /// `throttle_from` (1-based) on are rejected, and `kill_all` cancels every
    /// order without a fill.
    #[derive(Default)]
    struct FillingGateway {
        placed: AtomicUsize,
        throttle_from: Option<usize>,
        kill_all: bool,
        fills: Mutex<HashMap<String, OrderSnapshot>>,
    }

    #[async_trait]
    impl OrderGateway for FillingGateway {
        async fn place_order(&self, request: &OrderRequest) -> PlaceOrderResponse {
            let n = self.placed.fetch_add(1, Ordering::SeqCst) + 1;
            if self.throttle_from.is_some_and(|from| n >= from) {
                return PlaceOrderResponse::failed("HTTP 429: Too Many Requests");
            }
            let id = format!("o-{n}");
            let snapshot = if self.kill_all {
                OrderSnapshot {
                    status: Some(OrderStatus::Cancelled),
                    filled_size: Some(Decimal::ZERO),
                    price: None,
                }
            } else {
                OrderSnapshot {
                    status: Some(OrderStatus::Filled),
                    filled_size: Some(request.amount_usd / request.price_cap),
                    price: Some(request.price_cap),
                }
            };
            self.fills.lock().unwrap().insert(id.clone(), snapshot);
            PlaceOrderResponse::accepted(id)
        }

        async fn get_order(&self, order_id: &str) -> polymarket_core::Result<Option<OrderSnapshot>> {
            Ok(self.fills.lock().unwrap().get(order_id).cloned())
        }
    }

    fn deep_book() -> Arc<StaticBook> {
        Arc::new(StaticBook(vec![PriceLevel::new(d(50, 2), d(1_000, 0))]))
    }

    fn allowing(mut config: AutoTradeConfig) -> AutoTradeConfig {
        config.enabled = true;
        config.allow_conditions.insert("cond".to_string());
        config.sweep.interval_ms = 0;
        config
    }

    fn suggestion(id: &str) -> TradeSuggestion {
        // 0.49 + 0.01 buffer gives an exact 0.50 cap.
        TradeSuggestion::buy(id, "cond", "tok", d(49, 2), d(10, 0))
    }

    fn paper_trader(clock: &ManualClock) -> AutoTrader {
        let mut trader = AutoTrader::new(deep_book(), Arc::new(clock.clone()));
        trader.update_config(allowing(AutoTradeConfig::default())).unwrap();
        trader
    }

    fn live_trader(clock: &ManualClock, config: AutoTradeConfig) -> (AutoTrader, Arc<FillingGateway>) {
        let gateway = Arc::new(FillingGateway::default());
        let mut trader =
            AutoTrader::new(deep_book(), Arc::new(clock.clone())).with_gateway(gateway.clone());
        let mut config = allowing(config);
        config.paper.enabled = false;
        trader.update_config(config).unwrap();
        (trader, gateway)
    }

    fn skip_reason(entry: &HistoryEntry) -> Option<SkipReason> {
        match entry.outcome {
            HistoryOutcome::Skipped { reason, .. } => Some(reason),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_policy_and_validation_skips() {
        let clock = ManualClock::new(0);
        let mut trader = paper_trader(&clock);
        let mut config = trader.config().clone();
        config.deny_conditions.insert("bad".to_string());
        trader.update_config(config).unwrap();

        let denied = TradeSuggestion::buy("a", "bad", "tok", d(5, 1), d(1, 0));
        let not_allowed = TradeSuggestion::buy("b", "other", "tok", d(5, 1), d(1, 0));
        let mut sell = suggestion("c");
        sell.side = Some(OrderSide::Sell);
        let mut no_token = suggestion("d");
        no_token.token_id = Some("  ".to_string());
        let mut bad_price = suggestion("e");
        bad_price.leader_price = Some(d(1, 0));
        let mut zero_size = suggestion("f");
        zero_size.sized_amount = Some(Decimal::ZERO);

        let cases = [
            (denied, SkipReason::Denied),
            (not_allowed, SkipReason::NotAllowed),
            (sell, SkipReason::SideNotSupported),
            (no_token, SkipReason::MissingTokenId),
            (bad_price, SkipReason::BadPrice),
            (zero_size, SkipReason::ZeroSize),
        ];
        for (s, expected) in cases {
            let entry = trader.process(s).await.unwrap();
            assert_eq!(skip_reason(&entry), Some(expected));
        }

        let status = trader.status();
        assert_eq!(status.history_len, 6);
        assert_eq!(status.counters.get("not_allowed"), Some(&1));
        assert_eq!(status.paper_trades, 0);
    }

    #[tokio::test]
    async fn test_dedup_excludes_until_ttl_expires() {
        let clock = ManualClock::new(0);
        let mut trader = paper_trader(&clock);
        let denied = TradeSuggestion::buy("a", "other", "tok", d(5, 1), d(1, 0));

        assert!(trader.process(denied.clone()).await.is_some());
        clock.advance_ms(30_000);
        assert!(trader.process(denied.clone()).await.is_none());
        clock.advance_ms(1);
        assert!(trader.process(denied).await.is_some());

        let status = trader.status();
        assert_eq!(status.counters.get("deduped"), Some(&1));
        assert_eq!(status.history_len, 2);
    }

    #[tokio::test]
    async fn test_disabled_ignores_suggestions() {
        let clock = ManualClock::new(0);
        let mut trader = AutoTrader::new(deep_book(), Arc::new(clock));
        assert!(trader.process(suggestion("a")).await.is_none());
        assert_eq!(trader.recent_history(10).len(), 0);
    }

    #[tokio::test]
    async fn test_paper_mode_simulates_even_with_live_settings() {
        let clock = ManualClock::new(0);
        let (mut trader, gateway) = live_trader(&clock, AutoTradeConfig::default());
        let mut config = trader.config().clone();
        config.mode = TradeMode::Auto;
        config.paper.enabled = true;
        trader.update_config(config).unwrap();

        let entry = trader.process(suggestion("a")).await.unwrap();

        match entry.outcome {
            HistoryOutcome::Paper {
                filled_usd,
                stop_reason,
                ..
            } => {
                assert_eq!(filled_usd, d(10, 0));
                assert_eq!(stop_reason, StopReason::Filled);
            }
            other => panic!("expected paper outcome, got {other:?}"),
        }
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 0);
        let paper = trader.recent_paper(10);
        assert_eq!(paper.len(), 1);
        assert_eq!(paper[0].result.price_cap, d(50, 2));
        assert_eq!(trader.status().paper_filled_usd, d(10, 0));
    }

    #[tokio::test]
    async fn test_paper_min_fill_not_met() {
        let clock = ManualClock::new(0);
        let shallow = Arc::new(StaticBook(vec![PriceLevel::new(d(50, 2), d(4, 0))]));
        let mut trader = AutoTrader::new(shallow, Arc::new(clock));
        let mut config = allowing(AutoTradeConfig::default());
        config.paper.min_fill_pct = d(50, 0);
        trader.update_config(config).unwrap();

        trader.process(suggestion("a")).await.unwrap();

        let paper = trader.recent_paper(1);
        assert_eq!(paper[0].result.total_filled_usd, d(2, 0));
        assert_eq!(paper[0].error.as_deref(), Some(MIN_FILL_NOT_MET));
    }

    #[tokio::test]
    async fn test_live_auto_without_gateway_is_rejected() {
        let clock = ManualClock::new(0);
        let mut trader = paper_trader(&clock);
        let before = trader.config().clone();

        let mut config = before.clone();
        config.mode = TradeMode::Auto;
        config.paper.enabled = false;
        config.max_orders_per_hour = 7;

        assert_eq!(
            trader.update_config(config),
            Err(AutoTradeError::LiveWithoutCredential)
        );
        assert_eq!(trader.config(), &before);
    }

    #[tokio::test]
    async fn test_queue_then_approve() {
        let clock = ManualClock::new(0);
        let (mut trader, gateway) = live_trader(&clock, AutoTradeConfig::default());

        let entry = trader.process(suggestion("a")).await.unwrap();
        let HistoryOutcome::Queued { pending_id } = entry.outcome else {
            panic!("expected queued outcome");
        };
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 0);
        assert_eq!(trader.status().pending_open, 1);

        let executed = trader.execute_pending(pending_id).await.unwrap();
        assert_eq!(executed.order_id(), Some("o-1"));
        assert!(matches!(
            executed.state,
            PendingState::Executed { filled_usd, .. } if filled_usd == d(10, 0)
        ));
        assert_eq!(trader.status().orders_last_hour, 1);

        let again = trader.execute_pending(pending_id).await.unwrap_err();
        assert!(matches!(again, AutoTradeError::PendingNotOpen { .. }));
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skip_pending() {
        let clock = ManualClock::new(0);
        let (mut trader, _) = live_trader(&clock, AutoTradeConfig::default());
        trader.process(suggestion("a")).await.unwrap();
        let id = trader.recent_pending(1)[0].id;

        let skipped = trader.skip_pending(id, "operator declined").unwrap();
        assert_eq!(skipped.error(), Some("operator declined"));
        assert!(trader.skip_pending(id, "again").is_err());
        assert!(matches!(
            trader.skip_pending(Uuid::new_v4(), "x"),
            Err(AutoTradeError::PendingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_approval_requires_gateway() {
        let clock = ManualClock::new(0);
        let mut trader = AutoTrader::new(deep_book(), Arc::new(clock));
        let mut config = allowing(AutoTradeConfig::default());
        config.paper.enabled = false;
        trader.update_config(config).unwrap();

        trader.process(suggestion("a")).await.unwrap();
        let id = trader.recent_pending(1)[0].id;

        assert_eq!(
            trader.execute_pending(id).await.unwrap_err(),
            AutoTradeError::NoGateway
        );
        assert!(trader.pending(id).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_auto_mode_hourly_window() {
        let clock = ManualClock::new(0);
        let mut config = AutoTradeConfig::default();
        config.mode = TradeMode::Auto;
        config.max_orders_per_hour = 1;
        let (mut trader, gateway) = live_trader(&clock, config);

        let first = trader.process(suggestion("a")).await.unwrap();
        assert!(matches!(first.outcome, HistoryOutcome::Executed { .. }));
        assert!(!trader.can_execute_now());

        clock.advance_ms(1_000);
        let second = trader.process(suggestion("b")).await.unwrap();
        let HistoryOutcome::Skipped {
            reason: SkipReason::RateLimited,
            pending_id: Some(pending_id),
        } = second.outcome
        else {
            panic!("expected rate-limited skip");
        };
        let parked = trader.pending(pending_id).unwrap();
        assert_eq!(parked.state.as_str(), "skipped");
        assert_eq!(parked.error(), Some("rate_limited"));

        clock.set_ms(RATE_WINDOW_MS);
        assert!(trader.can_execute_now());
        let third = trader.process(suggestion("c")).await.unwrap();
        assert!(matches!(third.outcome, HistoryOutcome::Executed { .. }));
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_burst_sweep_counts_each_filled_order() {
        let clock = ManualClock::new(0);
        let mut config = AutoTradeConfig::default();
        config.mode = TradeMode::Auto;
        config.style = ExecutionStyle::Sweep;
        config.sweep.engine = SweepEngine::Burst;
        config.sweep.price_cap = d(50, 2);
        config.sweep.budget_usd = d(10, 0);
        config.sweep.max_orders = 4;
        let (mut trader, gateway) = live_trader(&clock, config);

        let entry = trader.process(suggestion("a")).await.unwrap();

        match entry.outcome {
            HistoryOutcome::Executed {
                filled_usd,
                stop_reason,
                ..
            } => {
                assert_eq!(filled_usd, d(10, 0));
                assert_eq!(stop_reason, Some(StopReason::BudgetExhausted));
            }
            other => panic!("expected executed outcome, got {other:?}"),
        }
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 4);
        assert_eq!(trader.status().orders_last_hour, 4);
    }

    #[tokio::test]
    async fn test_sweep_below_trigger() {
        let clock = ManualClock::new(0);
        let mut trader = paper_trader(&clock);
        let mut config = trader.config().clone();
        config.style = ExecutionStyle::Sweep;
        config.sweep.trigger_price = d(60, 2);
        trader.update_config(config).unwrap();

        let entry = trader.process(suggestion("a")).await.unwrap();
        assert_eq!(skip_reason(&entry), Some(SkipReason::BelowTrigger));
    }

    #[tokio::test]
    async fn test_failed_sweep_sets_last_error() {
        let clock = ManualClock::new(0);
        let mut config = AutoTradeConfig::default();
        config.mode = TradeMode::Auto;
        config.style = ExecutionStyle::Sweep;
        // Every ask sits above the cap.
        config.sweep.price_cap = d(40, 2);
        let (mut trader, _) = live_trader(&clock, config);

        let entry = trader.process(suggestion("a")).await.unwrap();

        assert_eq!(
            entry.outcome,
            HistoryOutcome::Failed {
                error: "no_depth".to_string()
            }
        );
        assert_eq!(trader.last_error(), Some("no_depth"));
        assert_eq!(trader.status().last_error.as_deref(), Some("no_depth"));
    }

    fn sweep_config(mode: TradeMode) -> AutoTradeConfig {
        let mut config = AutoTradeConfig::default();
        config.mode = mode;
        config.style = ExecutionStyle::Sweep;
        config.sweep.engine = SweepEngine::Sequential;
        config.sweep.price_cap = d(50, 2);
        config.sweep.budget_usd = d(10, 0);
        config
    }

    #[tokio::test]
    async fn test_partial_sweep_failure_sets_last_error() {
        let clock = ManualClock::new(0);
        let gateway = Arc::new(FillingGateway {
            throttle_from: Some(2),
            ..FillingGateway::default()
        });
        // $2 of depth, so each order is sized at 1.90.
        let shallow = Arc::new(StaticBook(vec![PriceLevel::new(d(50, 2), d(4, 0))]));
        let mut trader = AutoTrader::new(shallow, Arc::new(clock)).with_gateway(gateway.clone());
        let mut config = allowing(sweep_config(TradeMode::Auto));
        config.paper.enabled = false;
        trader.update_config(config).unwrap();

        let entry = trader.process(suggestion("a")).await.unwrap();

        match entry.outcome {
            HistoryOutcome::Executed {
                order_id,
                filled_usd,
                stop_reason,
            } => {
                assert_eq!(order_id.as_deref(), Some("o-1"));
                assert_eq!(filled_usd, d(190, 2));
                assert_eq!(stop_reason, Some(StopReason::OrderFailed));
            }
            other => panic!("expected executed outcome, got {other:?}"),
        }
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 2);
        assert_eq!(trader.last_error(), Some("HTTP 429: Too Many Requests"));
        assert_eq!(trader.status().orders_last_hour, 1);
    }

    #[tokio::test]
    async fn test_copy_order_without_fill_fails() {
        let clock = ManualClock::new(0);
        let gateway = Arc::new(FillingGateway {
            kill_all: true,
            ..FillingGateway::default()
        });
        let mut trader =
            AutoTrader::new(deep_book(), Arc::new(clock)).with_gateway(gateway.clone());
        let mut config = allowing(AutoTradeConfig::default());
        config.paper.enabled = false;
        config.mode = TradeMode::Auto;
        trader.update_config(config).unwrap();

        let entry = trader.process(suggestion("a")).await.unwrap();

        assert_eq!(
            entry.outcome,
            HistoryOutcome::Failed {
                error: "no_fill".to_string()
            }
        );
        assert_eq!(trader.last_error(), Some("no_fill"));
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 1);
        assert_eq!(trader.status().orders_last_hour, 0);
    }

    #[tokio::test]
    async fn test_zero_budget_skips_sweep() {
        let clock = ManualClock::new(0);
        let mut trader = paper_trader(&clock);
        let mut config = sweep_config(TradeMode::Queue);
        config.sweep.budget_usd = Decimal::ZERO;
        trader.update_config(allowing(config)).unwrap();

        let entry = trader.process(suggestion("a")).await.unwrap();

        assert_eq!(skip_reason(&entry), Some(SkipReason::ZeroBudget));
        assert_eq!(trader.status().paper_trades, 0);
    }

    #[tokio::test]
    async fn test_approved_sweep_uses_settings_from_enqueue() {
        let clock = ManualClock::new(0);
        let (mut trader, gateway) = live_trader(&clock, sweep_config(TradeMode::Queue));

        let entry = trader.process(suggestion("a")).await.unwrap();
        let HistoryOutcome::Queued { pending_id } = entry.outcome else {
            panic!("expected queued outcome");
        };

        // A cap under every ask and a burst engine would both change the result.
        let mut changed = trader.config().clone();
        changed.sweep.price_cap = d(40, 2);
        changed.sweep.budget_usd = d(40, 0);
        changed.sweep.engine = SweepEngine::Burst;
        trader.update_config(changed).unwrap();

        let executed = trader.execute_pending(pending_id).await.unwrap();

        assert!(matches!(
            executed.state,
            PendingState::Executed { filled_usd, .. } if filled_usd == d(10, 0)
        ));
        let result = executed.result.expect("sweep result recorded");
        assert_eq!(result.price_cap, d(50, 2));
        assert_eq!(result.budget_usd, d(10, 0));
        assert_eq!(result.rounds, 0);
        assert_eq!(result.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(gateway.placed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_processes_in_arrival_order() {
        let clock = ManualClock::new(0);
        let mut trader = paper_trader(&clock);
        let (tx, rx) = mpsc::channel(8);
        for id in ["a", "b", "c"] {
            tx.send(suggestion(id)).await.unwrap();
        }
        drop(tx);

        trader.run(rx).await;

        let ids: Vec<String> = trader
            .recent_history(10)
            .into_iter()
            .map(|e| e.suggestion_id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }
}
