//! Sweep results and the per-order bookkeeping shared by every executor.

use polymarket_core::api::OrderGateway;
use polymarket_core::types::{OrderRequest, OrderStatus};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::depth::DepthEstimate;
use crate::poller::{poll_until_terminal, PollConfig};

/// Smallest notional placed as a single order.
pub const MIN_ORDER_USD: Decimal = Decimal::ONE;

/// Why a sweep stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoBudget,
    NoDepth,
    NoFill,
    PartialFill,
    Filled,
    BudgetExhausted,
    OrderFailed,
    RateLimited,
    MaxOrders,
    MaxRounds,
    WindowElapsed,
    BookUnavailable,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoBudget => "no_budget",
            Self::NoDepth => "no_depth",
            Self::NoFill => "no_fill",
            Self::PartialFill => "partial_fill",
            Self::Filled => "filled",
            Self::BudgetExhausted => "budget_exhausted",
            Self::OrderFailed => "order_failed",
            Self::RateLimited => "rate_limited",
            Self::MaxOrders => "max_orders",
            Self::MaxRounds => "max_rounds",
            Self::WindowElapsed => "window_elapsed",
            Self::BookUnavailable => "book_unavailable",
        }
    }

    /// Stops that mean the attempt went wrong rather than ran its course.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::NoBudget
                | Self::NoDepth
                | Self::NoFill
                | Self::OrderFailed
                | Self::RateLimited
                | Self::BookUnavailable
        )
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One placed (or simulated) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLogEntry {
    pub submitted_at_ms: i64,
    /// Time for the placement call to return.
    pub roundtrip_ms: u64,
    /// Time from first poll to first observed status.
    pub status_latency_ms: Option<u64>,
    pub success: bool,
    pub attempted_usd: Decimal,
    pub price_cap: Decimal,
    pub order_id: Option<String>,
    pub order_status: Option<OrderStatus>,
    /// Shares filled, from the final observation.
    pub filled_size: Decimal,
    /// Execution price reported by the exchange, if any.
    pub order_price: Option<Decimal>,
    pub error_msg: Option<String>,
}

impl OrderLogEntry {
    /// USD filled. Falls back to the cap when no execution price was reported.
    pub fn filled_usd(&self) -> Decimal {
        self.filled_size * self.order_price.unwrap_or(self.price_cap)
    }

    pub fn has_fill(&self) -> bool {
        self.filled_size > Decimal::ZERO
    }

    /// Accepted, but no terminal status was observed.
    pub fn fill_unknown(&self) -> bool {
        self.success && !self.order_status.is_some_and(|s| s.is_terminal())
    }

    /// Budget this order used up. An unknown fill is charged the full attempt.
    pub fn committed_usd(&self) -> Decimal {
        if self.fill_unknown() {
            self.attempted_usd.max(self.filled_usd())
        } else {
            self.filled_usd()
        }
    }
}

/// Outcome of a simulated or live sweep. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub price_cap: Decimal,
    pub budget_usd: Decimal,
    pub depth_cap_usd: Decimal,
    pub levels_used: usize,
    pub total_orders: usize,
    pub total_attempted_usd: Decimal,
    pub total_filled_usd: Decimal,
    pub total_filled_shares: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub rounds: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub orders: Vec<OrderLogEntry>,
}

impl SweepResult {
    /// Orders that observed a positive fill.
    pub fn filled_order_count(&self) -> usize {
        self.orders.iter().filter(|o| o.has_fill()).count()
    }

    /// Filled share of the budget, in percent.
    pub fn fill_pct(&self) -> Decimal {
        if self.budget_usd <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.total_filled_usd / self.budget_usd * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

/// Parameters common to live sweeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepParams {
    pub token_id: String,
    pub price_cap: Decimal,
    pub budget_usd: Decimal,
    pub max_orders: usize,
    pub max_levels: usize,
    /// Pause between orders (sequential) or rounds (burst).
    pub order_interval: Duration,
}

/// Running totals while a sweep is in progress.
#[derive(Debug)]
pub(crate) struct SweepTally {
    price_cap: Decimal,
    budget_usd: Decimal,
    depth_cap_usd: Option<Decimal>,
    levels_used: usize,
    attempted_usd: Decimal,
    committed_usd: Decimal,
    filled_usd: Decimal,
    filled_shares: Decimal,
    pub(crate) rounds: u32,
    pub(crate) last_error: Option<String>,
    orders: Vec<OrderLogEntry>,
}

impl SweepTally {
    pub(crate) fn new(price_cap: Decimal, budget_usd: Decimal) -> Self {
        Self {
            price_cap,
            budget_usd,
            depth_cap_usd: None,
            levels_used: 0,
            attempted_usd: Decimal::ZERO,
            committed_usd: Decimal::ZERO,
            filled_usd: Decimal::ZERO,
            filled_shares: Decimal::ZERO,
            rounds: 0,
            last_error: None,
            orders: Vec::new(),
        }
    }

    /// Budget not yet covered by observed fills or by orders whose fill is
    /// unknown.
    pub(crate) fn remaining(&self) -> Decimal {
        (self.budget_usd - self.committed_usd).max(Decimal::ZERO)
    }

    pub(crate) fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// The first estimate sets the reported depth cap.
    pub(crate) fn note_depth(&mut self, depth: DepthEstimate) {
        if self.depth_cap_usd.is_none() {
            self.depth_cap_usd = Some(depth.depth_usd);
        }
        self.levels_used = self.levels_used.max(depth.levels_used);
    }

    pub(crate) fn note_levels(&mut self, levels: usize) {
        self.levels_used = self.levels_used.max(levels);
    }

    pub(crate) fn record(&mut self, entry: OrderLogEntry) {
        self.attempted_usd += entry.attempted_usd;
        self.committed_usd += entry.committed_usd();
        self.filled_usd += entry.filled_usd();
        self.filled_shares += entry.filled_size;
        if let Some(err) = &entry.error_msg {
            self.last_error = Some(err.clone());
        }
        self.orders.push(entry);
    }

    pub(crate) fn finish(self, stop_reason: StopReason) -> SweepResult {
        let avg_fill_price = (self.filled_shares > Decimal::ZERO)
            .then(|| (self.filled_usd / self.filled_shares).round_dp(6));
        SweepResult {
            price_cap: self.price_cap,
            budget_usd: self.budget_usd,
            depth_cap_usd: self.depth_cap_usd.unwrap_or(Decimal::ZERO),
            levels_used: self.levels_used,
            total_orders: self.orders.len(),
            total_attempted_usd: self.attempted_usd,
            total_filled_usd: self.filled_usd,
            total_filled_shares: self.filled_shares,
            avg_fill_price,
            stop_reason,
            rounds: self.rounds,
            error: self.last_error,
            orders: self.orders,
        }
    }
}

/// Round a notional down to whole cents.
pub(crate) fn floor_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Place one order and, when the gateway supports it, poll it to a terminal
/// status. Each call is one externally visible submission; nothing retries.
pub(crate) async fn submit_and_track(
    gateway: &dyn OrderGateway,
    clock: &dyn Clock,
    request: &OrderRequest,
    poll: &PollConfig,
) -> OrderLogEntry {
    let submitted_at_ms = clock.now_ms();
    let started = Instant::now();
    let response = gateway.place_order(request).await;
    let roundtrip_ms = started.elapsed().as_millis() as u64;

    let mut entry = OrderLogEntry {
        submitted_at_ms,
        roundtrip_ms,
        status_latency_ms: None,
        success: response.success,
        attempted_usd: request.amount_usd,
        price_cap: request.price_cap,
        order_id: response.order_id.clone(),
        order_status: None,
        filled_size: Decimal::ZERO,
        order_price: None,
        error_msg: response.error_msg.clone(),
    };

    if !response.success {
        if entry.error_msg.is_none() {
            entry.error_msg = Some("order rejected".to_string());
        }
        warn!(
            token_id = %request.token_id,
            amount_usd = %request.amount_usd,
            price_cap = %request.price_cap,
            error = ?entry.error_msg,
            "Order placement failed"
        );
        return entry;
    }

    let order_id = match (&response.order_id, gateway.supports_status_polling()) {
        (Some(id), true) => id.clone(),
        _ => {
            debug!(token_id = %request.token_id, "No status polling, fill unknown");
            return entry;
        }
    };

    let outcome = poll_until_terminal(gateway, &order_id, poll).await;
    entry.status_latency_ms = outcome.first_status_latency_ms;
    if let Some(snapshot) = outcome.snapshot {
        entry.order_status = snapshot.status;
        entry.filled_size = snapshot.filled_size.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
        entry.order_price = snapshot.price.filter(|p| *p > Decimal::ZERO);
    }
    if outcome.timed_out {
        debug!(
            order_id = %order_id,
            status = ?entry.order_status,
            filled = %entry.filled_size,
            "Status polling timed out, keeping last observation"
        );
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use polymarket_core::api::MockOrderGateway;
    use polymarket_core::types::{OrderSnapshot, PlaceOrderResponse};

    fn entry(filled: i64, price: Option<i64>) -> OrderLogEntry {
        OrderLogEntry {
            submitted_at_ms: 0,
            roundtrip_ms: 0,
            status_latency_ms: None,
            success: true,
            attempted_usd: Decimal::new(10, 0),
            price_cap: Decimal::new(60, 2),
            order_id: Some("o".to_string()),
            order_status: Some(OrderStatus::Filled),
            filled_size: Decimal::new(filled, 0),
            order_price: price.map(|p| Decimal::new(p, 2)),
            error_msg: None,
        }
    }

    #[test]
    fn test_filled_usd_falls_back_to_cap() {
        assert_eq!(entry(10, Some(50)).filled_usd(), Decimal::new(5, 0));
        assert_eq!(entry(10, None).filled_usd(), Decimal::new(6, 0));
    }

    #[test]
    fn test_tally_tracks_remaining_and_average() {
        let mut tally = SweepTally::new(Decimal::new(60, 2), Decimal::new(20, 0));
        tally.record(entry(10, Some(50)));
        tally.record(entry(10, None));

        assert_eq!(tally.remaining(), Decimal::new(9, 0));
        let result = tally.finish(StopReason::MaxOrders);
        assert_eq!(result.total_orders, 2);
        assert_eq!(result.total_attempted_usd, Decimal::new(20, 0));
        assert_eq!(result.total_filled_usd, Decimal::new(11, 0));
        assert_eq!(result.avg_fill_price, Some(Decimal::new(55, 2)));
        assert_eq!(result.filled_order_count(), 2);
        assert_eq!(result.fill_pct(), Decimal::new(55, 0));
    }

    #[test]
    fn test_unknown_fill_is_charged_in_full() {
        let mut tally = SweepTally::new(Decimal::new(60, 2), Decimal::new(20, 0));

        let mut no_status = entry(0, None);
        no_status.order_status = None;
        assert!(no_status.fill_unknown());
        tally.record(no_status);
        assert_eq!(tally.remaining(), Decimal::new(10, 0));

        // Timed out while still partially filled.
        let mut open = entry(5, Some(50));
        open.order_status = Some(OrderStatus::PartiallyFilled);
        assert_eq!(open.committed_usd(), Decimal::new(10, 0));
        tally.record(open);
        assert_eq!(tally.remaining(), Decimal::ZERO);

        let mut rejected = entry(0, None);
        rejected.success = false;
        rejected.order_status = None;
        assert!(!rejected.fill_unknown());
        assert_eq!(rejected.committed_usd(), Decimal::ZERO);

        let result = tally.finish(StopReason::BudgetExhausted);
        assert_eq!(result.total_filled_usd, Decimal::new(25, 1));
    }

    #[test]
    fn test_stop_reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&StopReason::BudgetExhausted).unwrap(),
            "\"budget_exhausted\""
        );
        assert_eq!(StopReason::RateLimited.to_string(), "rate_limited");
        assert!(StopReason::NoFill.is_failure());
        assert!(!StopReason::PartialFill.is_failure());
    }

    #[test]
    fn test_floor_cents() {
        assert_eq!(floor_cents(Decimal::new(33333, 3)), Decimal::new(3333, 2));
    }

    #[tokio::test]
    async fn test_submit_failure_is_recorded_not_polled() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_place_order()
            .times(1)
            .returning(|_| PlaceOrderResponse::failed("insufficient balance"));
        gateway.expect_get_order().never();

        let clock = ManualClock::new(7);
        let request = OrderRequest::buy("tok", Decimal::new(5, 0), Decimal::new(50, 2));
        let entry = submit_and_track(&gateway, &clock, &request, &PollConfig::default()).await;

        assert!(!entry.success);
        assert_eq!(entry.submitted_at_ms, 7);
        assert_eq!(entry.error_msg.as_deref(), Some("insufficient balance"));
        assert_eq!(entry.filled_usd(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_submit_without_polling_leaves_fill_unknown() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_place_order()
            .returning(|_| PlaceOrderResponse::accepted("o-9"));
        gateway.expect_supports_status_polling().return_const(false);
        gateway.expect_get_order().never();

        let request = OrderRequest::buy("tok", Decimal::new(5, 0), Decimal::new(50, 2));
        let entry =
            submit_and_track(&gateway, &ManualClock::new(0), &request, &PollConfig::default()).await;

        assert!(entry.success);
        assert_eq!(entry.order_id.as_deref(), Some("o-9"));
        assert!(entry.order_status.is_none());
        assert!(!entry.has_fill());
    }

    #[tokio::test]
    async fn test_submit_polls_fill() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_place_order()
            .returning(|_| PlaceOrderResponse::accepted("o-1"));
        gateway.expect_supports_status_polling().return_const(true);
        gateway.expect_get_order().returning(|_| {
            Ok(Some(OrderSnapshot {
                status: Some(OrderStatus::Filled),
                filled_size: Some(Decimal::new(8, 0)),
                price: Some(Decimal::new(50, 2)),
            }))
        });

        let request = OrderRequest::buy("tok", Decimal::new(4, 0), Decimal::new(55, 2));
        let entry =
            submit_and_track(&gateway, &ManualClock::new(0), &request, &PollConfig::default()).await;

        assert_eq!(entry.order_status, Some(OrderStatus::Filled));
        assert_eq!(entry.filled_usd(), Decimal::new(4, 0));
        assert!(entry.status_latency_ms.is_some());
    }
}
