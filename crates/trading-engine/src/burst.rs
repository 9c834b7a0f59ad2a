//! Burst live sweep.
//!
//! Each round reads the book once, lays out a price ladder, splits the
//! remaining budget into planned orders and places them concurrently. Workers
//! claim plan slots from a shared counter, so every slot is placed at most once
//! and its log entry is written exactly once by the worker that claimed it.

use polymarket_core::api::{MarketData, OrderGateway};
use polymarket_core::types::{normalize_asks, OrderRequest, PriceLevel};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::depth::estimate_depth;
use crate::poller::PollConfig;
use crate::sweep::{
    floor_cents, submit_and_track, OrderLogEntry, StopReason, SweepParams, SweepResult, SweepTally,
    MIN_ORDER_USD,
};

pub const DEFAULT_BURST_CONCURRENCY: usize = 5;
pub const MAX_BURST_CONCURRENCY: usize = 12;
pub const DEFAULT_MAX_ROUNDS: u32 = 10;
/// Consecutive rounds without any fill before the sweep gives up.
pub const ZERO_FILL_STREAK_LIMIT: u32 = 3;

const RATE_LIMIT_PATTERNS: [&str; 3] = ["429", "too many", "rate limit"];

/// Whether an exchange error signals throttling.
pub fn is_rate_limit_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Distinct ask prices at or below `price_cap`, taken from the cheapest
/// `max_levels` and returned most expensive first.
pub fn build_price_ladder(asks: &[PriceLevel], price_cap: Decimal, max_levels: usize) -> Vec<Decimal> {
    let mut ladder: Vec<Decimal> = Vec::new();
    for level in normalize_asks(asks) {
        if level.price > price_cap || ladder.len() >= max_levels {
            break;
        }
        if ladder.last() != Some(&level.price) {
            ladder.push(level.price);
        }
    }
    ladder.reverse();
    ladder
}

/// One slot of a round's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedOrder {
    pub amount_usd: Decimal,
    pub price_cap: Decimal,
}

/// Split `remaining_usd` into at most `max_orders` orders of at least
/// [`MIN_ORDER_USD`], cycling through `ladder` for prices.
///
/// Amounts are whole cents; the last slot absorbs the rounding remainder.
pub fn plan_orders(remaining_usd: Decimal, max_orders: usize, ladder: &[Decimal]) -> Vec<PlannedOrder> {
    if ladder.is_empty() || max_orders == 0 || remaining_usd < MIN_ORDER_USD {
        return Vec::new();
    }

    let by_budget = (remaining_usd / MIN_ORDER_USD)
        .floor()
        .to_usize()
        .unwrap_or(usize::MAX);
    let count = max_orders.min(by_budget);
    if count == 0 {
        return Vec::new();
    }

    let per_order = floor_cents(remaining_usd / Decimal::from(count));
    let last = floor_cents(remaining_usd - per_order * Decimal::from(count - 1));

    (0..count)
        .map(|i| PlannedOrder {
            amount_usd: if i + 1 == count { last } else { per_order },
            price_cap: ladder[i % ladder.len()],
        })
        .collect()
}

/// Burst-specific knobs on top of the common sweep parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstParams {
    pub sweep: SweepParams,
    /// Parallel placements per round, clamped to 1..=12.
    pub concurrency: usize,
    pub max_rounds: u32,
    /// Optional wall-clock budget for the whole sweep.
    pub window: Option<Duration>,
    /// Caps the plan size of a single round. `None` plans every remaining order.
    pub orders_per_round: Option<usize>,
}

impl BurstParams {
    pub fn new(sweep: SweepParams) -> Self {
        Self {
            sweep,
            concurrency: DEFAULT_BURST_CONCURRENCY,
            max_rounds: DEFAULT_MAX_ROUNDS,
            window: None,
            orders_per_round: None,
        }
    }
}

struct RoundState {
    token_id: String,
    plan: Vec<PlannedOrder>,
    next: AtomicUsize,
    abort: AtomicBool,
    slots: Vec<OnceLock<OrderLogEntry>>,
}

struct RoundOutcome {
    entries: Vec<OrderLogEntry>,
    rate_limited: bool,
}

pub struct BurstSweeper {
    market: Arc<dyn MarketData>,
    gateway: Arc<dyn OrderGateway>,
    clock: Arc<dyn Clock>,
    poll: PollConfig,
}

impl BurstSweeper {
    pub fn new(
        market: Arc<dyn MarketData>,
        gateway: Arc<dyn OrderGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            market,
            gateway,
            clock,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub async fn run(&self, params: &BurstParams) -> SweepResult {
        let sweep = &params.sweep;
        let mut tally = SweepTally::new(sweep.price_cap, sweep.budget_usd);
        if sweep.budget_usd <= Decimal::ZERO {
            return tally.finish(StopReason::NoBudget);
        }

        let concurrency = params.concurrency.clamp(1, MAX_BURST_CONCURRENCY);
        let started = Instant::now();
        let mut zero_fill_streak = 0u32;

        let stop = loop {
            let remaining = tally.remaining();
            if remaining < MIN_ORDER_USD {
                break StopReason::BudgetExhausted;
            }
            let orders_left = sweep.max_orders.saturating_sub(tally.order_count());
            if orders_left == 0 {
                break StopReason::MaxOrders;
            }
            if tally.rounds >= params.max_rounds {
                break StopReason::MaxRounds;
            }
            if tally.rounds > 0 {
                if params.window.is_some_and(|w| started.elapsed() >= w) {
                    break StopReason::WindowElapsed;
                }
                if !sweep.order_interval.is_zero() {
                    tokio::time::sleep(sweep.order_interval).await;
                }
            }

            let book = match self.market.get_order_book(&sweep.token_id).await {
                Ok(book) => book,
                Err(e) => {
                    warn!(token_id = %sweep.token_id, error = %e, "Book fetch failed mid-burst");
                    tally.last_error = Some(format!("book fetch failed: {e}"));
                    break StopReason::BookUnavailable;
                }
            };

            let asks = book.sorted_asks();
            tally.note_depth(estimate_depth(&asks, sweep.price_cap, remaining, sweep.max_levels));

            let ladder = build_price_ladder(&asks, sweep.price_cap, sweep.max_levels.min(orders_left));
            if ladder.is_empty() {
                break StopReason::NoDepth;
            }
            let round_cap = params
                .orders_per_round
                .map_or(orders_left, |n| n.max(1).min(orders_left));
            let plan = plan_orders(remaining, round_cap, &ladder);
            if plan.is_empty() {
                break StopReason::BudgetExhausted;
            }

            tally.rounds += 1;
            tally.note_levels(ladder.len());
            debug!(
                token_id = %sweep.token_id,
                round = tally.rounds,
                planned = plan.len(),
                ladder = ?ladder,
                "Starting burst round"
            );

            let outcome = self.execute_round(&sweep.token_id, plan, concurrency).await;
            let round_filled: Decimal = outcome.entries.iter().map(|e| e.filled_usd()).sum();
            let placed = outcome.entries.len();
            for entry in outcome.entries {
                tally.record(entry);
            }

            info!(
                token_id = %sweep.token_id,
                round = tally.rounds,
                placed = placed,
                filled_usd = %round_filled,
                "Burst round complete"
            );

            if outcome.rate_limited {
                break StopReason::RateLimited;
            }
            if round_filled <= Decimal::ZERO {
                zero_fill_streak += 1;
                if zero_fill_streak >= ZERO_FILL_STREAK_LIMIT {
                    break StopReason::NoFill;
                }
            } else {
                zero_fill_streak = 0;
            }
        };

        let result = tally.finish(stop);
        info!(
            token_id = %sweep.token_id,
            rounds = result.rounds,
            orders = result.total_orders,
            filled_usd = %result.total_filled_usd,
            stop_reason = %result.stop_reason,
            "Burst sweep finished"
        );
        result
    }

    async fn execute_round(
        &self,
        token_id: &str,
        plan: Vec<PlannedOrder>,
        concurrency: usize,
    ) -> RoundOutcome {
        let slots = plan.iter().map(|_| OnceLock::new()).collect();
        let workers_needed = concurrency.min(plan.len());
        let state = Arc::new(RoundState {
            token_id: token_id.to_string(),
            plan,
            next: AtomicUsize::new(0),
            abort: AtomicBool::new(false),
            slots,
        });

        let mut workers = JoinSet::new();
        for _ in 0..workers_needed {
            let state = state.clone();
            let gateway = self.gateway.clone();
            let clock = self.clock.clone();
            let poll = self.poll;
            workers.spawn(async move { burst_worker(state, gateway, clock, poll).await });
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Burst worker did not complete");
            }
        }

        RoundOutcome {
            entries: state.slots.iter().filter_map(|s| s.get().cloned()).collect(),
            rate_limited: state.abort.load(Ordering::Acquire),
        }
    }
}

async fn burst_worker(
    state: Arc<RoundState>,
    gateway: Arc<dyn OrderGateway>,
    clock: Arc<dyn Clock>,
    poll: PollConfig,
) {
    loop {
        if state.abort.load(Ordering::Acquire) {
            return;
        }
        let index = state.next.fetch_add(1, Ordering::AcqRel);
        let Some(order) = state.plan.get(index) else {
            return;
        };

        let request = OrderRequest::buy(state.token_id.clone(), order.amount_usd, order.price_cap);
        let entry = submit_and_track(gateway.as_ref(), clock.as_ref(), &request, &poll).await;

        if entry.error_msg.as_deref().is_some_and(is_rate_limit_error) {
            warn!(
                token_id = %state.token_id,
                slot = index,
                error = ?entry.error_msg,
                "Rate limited, aborting round"
            );
            state.abort.store(true, Ordering::Release);
        }

        if state.slots[index].set(entry).is_err() {
            warn!(slot = index, "Burst slot written twice");
        }
    }
}
