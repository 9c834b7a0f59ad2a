//! Dry-run sweep against a book snapshot.
//!
//! Used for paper trading and opportunity scoring. Pure: never touches the
//! order gateway.

use polymarket_core::types::{normalize_asks, OrderStatus, PriceLevel};
use rust_decimal::Decimal;

use crate::depth::estimate_depth;
use crate::sweep::{OrderLogEntry, StopReason, SweepResult, SweepTally};

/// Inputs to a simulated sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationParams {
    pub price_cap: Decimal,
    pub budget_usd: Decimal,
    pub max_levels: usize,
    /// Timestamp stamped on the synthetic order entry.
    pub at_ms: i64,
}

/// Simulate sweeping `asks` up to `price_cap` with `budget_usd`.
///
/// Spend is capped by the depth available at or below the cap. The walk
/// fills whole levels until the spend runs out, then takes a partial slice of
/// the last level.
pub fn simulate_sweep(asks: &[PriceLevel], params: &SimulationParams) -> SweepResult {
    let asks = normalize_asks(asks);
    let budget = params.budget_usd.max(Decimal::ZERO);
    let depth = estimate_depth(&asks, params.price_cap, budget, params.max_levels);
    let spend = budget.min(depth.depth_usd);

    let mut remaining = spend;
    let mut filled_usd = Decimal::ZERO;
    let mut filled_shares = Decimal::ZERO;
    let mut levels_used = 0;

    for level in asks.iter().take(params.max_levels) {
        if level.price > params.price_cap || remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(level.notional());
        filled_shares += take / level.price;
        filled_usd += take;
        remaining -= take;
        levels_used += 1;
    }

    let stop_reason = if budget <= Decimal::ZERO {
        StopReason::NoBudget
    } else if depth.depth_usd <= Decimal::ZERO {
        StopReason::NoDepth
    } else if filled_usd <= Decimal::ZERO {
        StopReason::NoFill
    } else if filled_usd < budget {
        StopReason::PartialFill
    } else {
        StopReason::Filled
    };

    let avg_price = (filled_shares > Decimal::ZERO).then(|| (filled_usd / filled_shares).round_dp(6));
    let order_status = if filled_usd <= Decimal::ZERO {
        OrderStatus::Cancelled
    } else if filled_usd < budget {
        OrderStatus::PartiallyFilled
    } else {
        OrderStatus::Filled
    };

    let mut tally = SweepTally::new(params.price_cap, budget);
    tally.note_depth(depth);
    tally.note_levels(levels_used);
    tally.record(OrderLogEntry {
        submitted_at_ms: params.at_ms,
        roundtrip_ms: 0,
        status_latency_ms: None,
        success: filled_usd > Decimal::ZERO,
        attempted_usd: budget,
        price_cap: params.price_cap,
        order_id: None,
        order_status: Some(order_status),
        filled_size: filled_shares,
        order_price: avg_price,
        error_msg: (filled_usd <= Decimal::ZERO).then(|| stop_reason.to_string()),
    });

    let mut result = tally.finish(stop_reason);
    // Simulated totals are exact; do not re-derive them from the rounded price.
    result.total_filled_usd = filled_usd;
    result.avg_fill_price = avg_price;
    result.levels_used = levels_used;
    result
}
