//! Order book and quote types for Polymarket outcome tokens.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Real-time order book data for a market outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub market_id: String,
    pub outcome_id: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    /// An empty book for `token_id`, stamped now.
    pub fn empty(token_id: impl Into<String>) -> Self {
        Self {
            market_id: String::new(),
            outcome_id: token_id.into(),
            timestamp: Utc::now(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Returns the best bid price (highest buy order).
    ///
    /// The exchange does not guarantee level ordering, so this scans.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids
            .iter()
            .filter(|l| l.is_valid())
            .map(|l| l.price)
            .max()
    }

    /// Returns the best ask price (lowest sell order).
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks
            .iter()
            .filter(|l| l.is_valid())
            .map(|l| l.price)
            .min()
    }

    /// Best bid and ask as a quote pair, when both sides are present.
    pub fn quote_pair(&self) -> Option<QuotePair> {
        QuotePair::new(self.best_ask()?, self.best_bid()?)
    }

    /// Asks sorted ascending, invalid levels removed.
    pub fn sorted_asks(&self) -> Vec<PriceLevel> {
        normalize_asks(&self.asks)
    }
}

/// A single price level in the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// USD notional resting at this level.
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }

    pub fn is_valid(&self) -> bool {
        self.price > Decimal::ZERO && self.size > Decimal::ZERO
    }
}

/// Sort asks ascending by price, dropping levels with non-positive price or size.
pub fn normalize_asks(levels: &[PriceLevel]) -> Vec<PriceLevel> {
    let mut asks: Vec<PriceLevel> = levels.iter().copied().filter(|l| l.is_valid()).collect();
    asks.sort_by(|a, b| a.price.cmp(&b.price));
    asks
}

/// Best ask and best bid for one outcome token, both strictly inside (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePair {
    pub best_ask: Decimal,
    pub best_bid: Decimal,
}

impl QuotePair {
    /// Returns `None` unless both prices lie strictly between 0 and 1.
    pub fn new(best_ask: Decimal, best_bid: Decimal) -> Option<Self> {
        let in_range = |p: Decimal| p > Decimal::ZERO && p < Decimal::ONE;
        if in_range(best_ask) && in_range(best_bid) {
            Some(Self { best_ask, best_bid })
        } else {
            None
        }
    }
}
