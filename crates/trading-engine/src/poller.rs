//! Order status polling with a hard wall-clock deadline.

use polymarket_core::api::OrderGateway;
use polymarket_core::types::OrderSnapshot;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How often and for how long to poll an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

/// What polling observed before the order went terminal or time ran out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Last snapshot seen. On timeout this is final: it is not assumed
    /// filled or cancelled, and later fills are never picked up.
    pub snapshot: Option<OrderSnapshot>,
    /// Milliseconds from the first poll to the first snapshot carrying a status.
    pub first_status_latency_ms: Option<u64>,
    pub timed_out: bool,
}

/// Poll `order_id` every `config.interval` until it reaches a terminal status
/// or `config.timeout` elapses. Lookup errors count as "no observation".
pub async fn poll_until_terminal(
    gateway: &dyn OrderGateway,
    order_id: &str,
    config: &PollConfig,
) -> PollOutcome {
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut outcome = PollOutcome::default();

    loop {
        match tokio::time::timeout_at(deadline, gateway.get_order(order_id)).await {
            Ok(Ok(Some(snapshot))) => {
                if outcome.first_status_latency_ms.is_none() && snapshot.status.is_some() {
                    outcome.first_status_latency_ms = Some(started.elapsed().as_millis() as u64);
                }
                let terminal = snapshot.is_terminal();
                outcome.snapshot = Some(snapshot);
                if terminal {
                    return outcome;
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                debug!(order_id = order_id, error = %e, "Order status lookup failed");
            }
            Err(_) => {
                outcome.timed_out = true;
                return outcome;
            }
        }

        let now = Instant::now();
        if now >= deadline {
            outcome.timed_out = true;
            return outcome;
        }
        tokio::time::sleep(config.interval.min(deadline - now)).await;
    }
}
