//! Depth estimation against a price ceiling.

use polymarket_core::types::PriceLevel;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Notional absorbable at or below a price ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthEstimate {
    /// Cumulative USD notional across the consumed levels.
    pub depth_usd: Decimal,
    pub levels_used: usize,
}

/// Walk ascending `asks` up to `price_cap`, consuming at most `max_levels`
/// levels and stopping once `target_usd` is covered.
///
/// The first level priced above the cap ends the walk. Non-positive cap,
/// target or level limit yields zero depth.
pub fn estimate_depth(
    asks: &[PriceLevel],
    price_cap: Decimal,
    target_usd: Decimal,
    max_levels: usize,
) -> DepthEstimate {
    let mut estimate = DepthEstimate::default();
    if price_cap <= Decimal::ZERO || target_usd <= Decimal::ZERO || max_levels == 0 {
        return estimate;
    }

    for level in asks.iter().filter(|l| l.is_valid()) {
        if level.price > price_cap || estimate.levels_used >= max_levels {
            break;
        }
        estimate.depth_usd += level.notional();
        estimate.levels_used += 1;
        if estimate.depth_usd >= target_usd {
            break;
        }
    }

    estimate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asks() -> Vec<PriceLevel> {
        vec![
            PriceLevel::new(Decimal::new(50, 2), Decimal::new(100, 0)), // $50
            PriceLevel::new(Decimal::new(52, 2), Decimal::new(50, 0)),  // $26
            PriceLevel::new(Decimal::new(55, 2), Decimal::new(100, 0)), // $55
        ]
    }

    #[test]
    fn test_stops_at_price_cap() {
        let est = estimate_depth(&asks(), Decimal::new(52, 2), Decimal::new(1000, 0), 10);
        assert_eq!(est.depth_usd, Decimal::new(76, 0));
        assert_eq!(est.levels_used, 2);
    }

    #[test]
    fn test_stops_once_target_reached() {
        let est = estimate_depth(&asks(), Decimal::new(99, 2), Decimal::new(60, 0), 10);
        assert_eq!(est.depth_usd, Decimal::new(76, 0));
        assert_eq!(est.levels_used, 2);

        let est = estimate_depth(&asks(), Decimal::new(99, 2), Decimal::new(50, 0), 10);
        assert_eq!(est.levels_used, 1);
    }

    #[test]
    fn test_respects_level_cap() {
        let est = estimate_depth(&asks(), Decimal::new(99, 2), Decimal::new(1000, 0), 1);
        assert_eq!(est.depth_usd, Decimal::new(50, 0));
        assert_eq!(est.levels_used, 1);
    }

    #[test]
    fn test_non_positive_inputs_yield_zero() {
        let zero = DepthEstimate::default();
        assert_eq!(estimate_depth(&asks(), Decimal::ZERO, Decimal::ONE, 5), zero);
        assert_eq!(estimate_depth(&asks(), Decimal::ONE, Decimal::ZERO, 5), zero);
        assert_eq!(estimate_depth(&asks(), Decimal::ONE, -Decimal::ONE, 5), zero);
        assert_eq!(estimate_depth(&asks(), Decimal::ONE, Decimal::ONE, 0), zero);
        assert_eq!(estimate_depth(&[], Decimal::ONE, Decimal::ONE, 5), zero);
    }

    #[test]
    fn test_cap_below_best_ask() {
        let est = estimate_depth(&asks(), Decimal::new(49, 2), Decimal::new(10, 0), 5);
        assert_eq!(est.depth_usd, Decimal::ZERO);
        assert_eq!(est.levels_used, 0);
    }
}
