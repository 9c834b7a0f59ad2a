//! Mirrored-orderbook arbitrage pricing for binary markets.
//!
//! Buying YES at `p` is economically the same as selling NO at `1 - p`, so
//! every quote on one token implies a synthetic quote on its complement.
//! The effective price of each action is the better of the direct quote and
//! the synthetic one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::{OrderBook, QuotePair};

/// The four best quotes of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryQuotes {
    pub yes: QuotePair,
    pub no: QuotePair,
}

impl BinaryQuotes {
    /// Build from raw prices; `None` if any price lies outside (0, 1).
    pub fn new(yes_ask: Decimal, yes_bid: Decimal, no_ask: Decimal, no_bid: Decimal) -> Option<Self> {
        Some(Self {
            yes: QuotePair::new(yes_ask, yes_bid)?,
            no: QuotePair::new(no_ask, no_bid)?,
        })
    }

    /// Best quotes from both outcome books; `None` if any side is empty.
    pub fn from_books(yes: &OrderBook, no: &OrderBook) -> Option<Self> {
        Some(Self {
            yes: yes.quote_pair()?,
            no: no.quote_pair()?,
        })
    }
}

/// Effective prices after accounting for the mirrored book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePrices {
    pub buy_yes: Decimal,
    pub buy_no: Decimal,
    pub sell_yes: Decimal,
    pub sell_no: Decimal,
}

impl EffectivePrices {
    pub fn from_quotes(quotes: &BinaryQuotes) -> Self {
        let BinaryQuotes { yes, no } = quotes;
        Self {
            buy_yes: yes.best_ask.min(Decimal::ONE - no.best_bid),
            buy_no: no.best_ask.min(Decimal::ONE - yes.best_bid),
            sell_yes: yes.best_bid.max(Decimal::ONE - no.best_ask),
            sell_no: no.best_bid.max(Decimal::ONE - yes.best_ask),
        }
    }

    /// Cost of acquiring one YES and one NO share.
    pub fn buy_sum(&self) -> Decimal {
        self.buy_yes + self.buy_no
    }

    /// Proceeds of disposing of one YES and one NO share.
    pub fn sell_sum(&self) -> Decimal {
        self.sell_yes + self.sell_no
    }
}

/// Direction of an arbitrage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArbKind {
    /// Buy both outcomes for less than the guaranteed payout of 1.
    Long,
    /// Sell both outcomes for more than the payout of 1.
    Short,
}

/// Arbitrage opportunity detected from a market's quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbOpportunity {
    pub kind: ArbKind,
    /// Guaranteed profit per share pair, in [0, 1).
    pub profit: Decimal,
    pub narrative: String,
    pub prices: EffectivePrices,
}

impl ArbOpportunity {
    /// Returns true if the profit clears `min_profit`.
    pub fn is_profitable(&self, min_profit: Decimal) -> bool {
        self.profit > min_profit
    }
}

/// Check a market's quotes for a long or short arbitrage.
///
/// The long and short tests read different quote subsets, so both can fire at
/// once. The larger profit wins; an exact tie goes to long, which is the
/// executable side for a buy-only engine.
pub fn check_arbitrage(quotes: &BinaryQuotes) -> Option<ArbOpportunity> {
    let prices = EffectivePrices::from_quotes(quotes);

    let long = (prices.buy_sum() < Decimal::ONE).then(|| ArbOpportunity {
        kind: ArbKind::Long,
        profit: Decimal::ONE - prices.buy_sum(),
        narrative: format!(
            "buy YES@{} + buy NO@{} = {} < 1",
            prices.buy_yes,
            prices.buy_no,
            prices.buy_sum()
        ),
        prices,
    });

    let short = (prices.sell_sum() > Decimal::ONE).then(|| ArbOpportunity {
        kind: ArbKind::Short,
        profit: prices.sell_sum() - Decimal::ONE,
        narrative: format!(
            "sell YES@{} + sell NO@{} = {} > 1",
            prices.sell_yes,
            prices.sell_no,
            prices.sell_sum()
        ),
        prices,
    });

    match (long, short) {
        (Some(l), Some(s)) if s.profit > l.profit => Some(s),
        (Some(l), _) => Some(l),
        (None, s) => s,
    }
}
