//! Sequential live sweep: one real order per iteration, re-reading the book
//! before each placement and polling every order to completion.

use polymarket_core::api::{MarketData, OrderGateway};
use polymarket_core::types::OrderRequest;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::depth::estimate_depth;
use crate::poller::PollConfig;
use crate::sweep::{
    floor_cents, submit_and_track, StopReason, SweepParams, SweepResult, SweepTally, MIN_ORDER_USD,
};

/// Fraction of the estimated depth a single order may target. Books move
/// between the read and the placement, so orders are sized under the estimate.
pub const SEQUENTIAL_DEPTH_HAIRCUT: Decimal = Decimal::from_parts(95, 0, 0, false, 2);

/// Places orders one at a time until the budget, the depth, or the order
/// allowance runs out.
pub struct SequentialSweeper {
    market: Arc<dyn MarketData>,
    gateway: Arc<dyn OrderGateway>,
    clock: Arc<dyn Clock>,
    poll: PollConfig,
}

impl SequentialSweeper {
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

    pub async fn run(&self, params: &SweepParams) -> SweepResult {
        let mut tally = SweepTally::new(params.price_cap, params.budget_usd);
        if params.budget_usd <= Decimal::ZERO {
            return tally.finish(StopReason::NoBudget);
        }

        let stop = loop {
            if tally.remaining() < MIN_ORDER_USD {
                break StopReason::BudgetExhausted;
            }
            if tally.order_count() >= params.max_orders {
                break StopReason::MaxOrders;
            }

            let book = match self.market.get_order_book(&params.token_id).await {
                Ok(book) => book,
                Err(e) => {
                    warn!(token_id = %params.token_id, error = %e, "Book fetch failed mid-sweep");
                    tally.last_error = Some(format!("book fetch failed: {e}"));
                    break StopReason::BookUnavailable;
                }
            };

            let asks = book.sorted_asks();
            let remaining = tally.remaining();
            let depth = estimate_depth(&asks, params.price_cap, remaining, params.max_levels);
            tally.note_depth(depth);

            let safe_depth = depth.depth_usd * SEQUENTIAL_DEPTH_HAIRCUT;
            if safe_depth <= Decimal::ZERO {
                break StopReason::NoDepth;
            }

            let amount = floor_cents(remaining.min(safe_depth)).max(MIN_ORDER_USD);
            let request = OrderRequest::buy(params.token_id.clone(), amount, params.price_cap);
            let entry = submit_and_track(
                self.gateway.as_ref(),
                self.clock.as_ref(),
                &request,
                &self.poll,
            )
            .await;

            let success = entry.success;
            let filled_usd = entry.filled_usd();
            info!(
                token_id = %params.token_id,
                order = tally.order_count() + 1,
                amount_usd = %amount,
                filled_usd = %filled_usd,
                status = ?entry.order_status,
                "Sweep order complete"
            );
            tally.record(entry);

            if !success {
                break StopReason::OrderFailed;
            }
            if filled_usd <= Decimal::ZERO {
                break StopReason::NoFill;
            }

            if !params.order_interval.is_zero() {
                tokio::time::sleep(params.order_interval).await;
            }
        };

        let result = tally.finish(stop);
        info!(
            token_id = %params.token_id,
            orders = result.total_orders,
            filled_usd = %result.total_filled_usd,
            stop_reason = %result.stop_reason,
            "Sequential sweep finished"
        );
        result
    }
}
