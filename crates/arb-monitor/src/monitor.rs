//! Core arbitrage monitoring logic.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use polymarket_core::api::MarketData;
use polymarket_core::types::{check_arbitrage, ArbKind, ArbOpportunity, BinaryQuotes, OrderBook};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};
use trading_engine::{simulate_sweep, SimulationParams, SweepResult};

/// Cooldown period between signals for the same market (seconds).
const SIGNAL_COOLDOWN_SECS: i64 = 60;

const KEY_ARB_MARKETS: &str = "ARB_MARKETS";
const KEY_ARB_MIN_PROFIT_THRESHOLD: &str = "ARB_MIN_PROFIT_THRESHOLD";
const KEY_ARB_POLL_INTERVAL_MS: &str = "ARB_POLL_INTERVAL_MS";
const KEY_ARB_SCORE_BUDGET_USD: &str = "ARB_SCORE_BUDGET_USD";
const KEY_ARB_SCORE_MAX_LEVELS: &str = "ARB_SCORE_MAX_LEVELS";
const KEY_ARB_SIGNAL_COOLDOWN_SECS: &str = "ARB_SIGNAL_COOLDOWN_SECS";

/// A binary market identified by its two outcome tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketPair {
    pub label: String,
    pub yes_token: String,
    pub no_token: String,
}

impl MarketPair {
    /// Parse `label:yes_token:no_token` or `yes_token:no_token`.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
        let (label, yes, no) = match parts.as_slice() {
            [yes, no] => (format!("{yes}/{no}"), *yes, *no),
            [label, yes, no] => (label.to_string(), *yes, *no),
            _ => return None,
        };
        if yes.is_empty() || no.is_empty() {
            return None;
        }
        Some(Self {
            label,
            yes_token: yes.to_string(),
            no_token: no.to_string(),
        })
    }
}

/// Comma-separated list of market pairs. Malformed entries are an error.
pub fn parse_market_list(raw: &str) -> Result<Vec<MarketPair>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            MarketPair::parse(entry).with_context(|| format!("malformed market entry: {entry}"))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub markets: Vec<MarketPair>,
    /// Minimum per-pair profit for an opportunity to be reported.
    pub min_profit_threshold: Decimal,
    pub poll_interval: StdDuration,
    pub cooldown_secs: i64,
    /// Notional each long leg is scored with.
    pub score_budget_usd: Decimal,
    pub score_max_levels: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            markets: Vec::new(),
            min_profit_threshold: Decimal::new(5, 3),
            poll_interval: StdDuration::from_millis(2_000),
            cooldown_secs: SIGNAL_COOLDOWN_SECS,
            score_budget_usd: Decimal::new(100, 0),
            score_max_levels: 10,
        }
    }
}

impl MonitorSettings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let markets = parse_market_list(&std::env::var(KEY_ARB_MARKETS).unwrap_or_default())?;
        if markets.is_empty() {
            bail!("{KEY_ARB_MARKETS} must list at least one yes_token:no_token pair");
        }

        Ok(Self {
            markets,
            min_profit_threshold: env_or(KEY_ARB_MIN_PROFIT_THRESHOLD, defaults.min_profit_threshold)
                .max(Decimal::ZERO),
            poll_interval: StdDuration::from_millis(
                env_or(KEY_ARB_POLL_INTERVAL_MS, 2_000u64).max(100),
            ),
            cooldown_secs: env_or(KEY_ARB_SIGNAL_COOLDOWN_SECS, defaults.cooldown_secs).max(0),
            score_budget_usd: env_or(KEY_ARB_SCORE_BUDGET_USD, defaults.score_budget_usd)
                .max(Decimal::ONE),
            score_max_levels: env_or(KEY_ARB_SCORE_MAX_LEVELS, defaults.score_max_levels)
                .clamp(1, 50),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Simulated fills for both legs of a long arbitrage.
#[derive(Debug, Clone)]
pub struct LegScores {
    pub yes: SweepResult,
    pub no: SweepResult,
    /// Complete YES+NO pairs the simulated fills would lock in.
    pub executable_pairs: Decimal,
}

#[derive(Debug, Clone)]
pub struct ScoredOpportunity {
    pub market: String,
    pub opportunity: ArbOpportunity,
    /// `None` for short opportunities, which a buy-only engine cannot take.
    pub legs: Option<LegScores>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub scans: u64,
    pub book_errors: u64,
    pub opportunities: u64,
    pub cooled_down: u64,
}

/// Main arbitrage monitor service.
pub struct ArbMonitor {
    market: Arc<dyn MarketData>,
    settings: MonitorSettings,
    /// Last signal timestamp per market (for dedup/cooldown).
    last_signal_time: HashMap<String, DateTime<Utc>>,
    stats: ScanStats,
}

impl ArbMonitor {
    pub fn new(settings: MonitorSettings, market: Arc<dyn MarketData>) -> Self {
        Self {
            market,
            settings,
            last_signal_time: HashMap::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Run the monitoring loop until ctrl-c.
    pub async fn run(&mut self) -> Result<()> {
        let mut poll_tick = tokio::time::interval(self.settings.poll_interval);
        poll_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut stats_tick = tokio::time::interval(StdDuration::from_secs(60));
        stats_tick.tick().await;

        info!(
            markets = self.settings.markets.len(),
            interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Monitoring for arbitrage..."
        );

        loop {
            tokio::select! {
                _ = poll_tick.tick() => {
                    for scored in self.scan_once(Utc::now()).await {
                        log_opportunity(&scored);
                    }
                    crate::touch_health_file();
                }
                _ = stats_tick.tick() => {
                    let stats = self.stats;
                    info!(
                        scans = stats.scans,
                        book_errors = stats.book_errors,
                        opportunities = stats.opportunities,
                        cooled_down = stats.cooled_down,
                        "Arb monitor stats"
                    );
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, stopping monitor");
                    return Ok(());
                }
            }
        }
    }

    /// Fetch every configured market once and return the opportunities that
    /// clear the threshold and are outside their cooldown.
    pub async fn scan_once(&mut self, now: DateTime<Utc>) -> Vec<ScoredOpportunity> {
        self.stats.scans += 1;

        let fetches = self.settings.markets.iter().cloned().map(|pair| {
            let market = Arc::clone(&self.market);
            async move {
                let (yes, no) = tokio::join!(
                    market.get_order_book(&pair.yes_token),
                    market.get_order_book(&pair.no_token)
                );
                (pair, yes, no)
            }
        });
        let books = join_all(fetches).await;

        let mut found = Vec::new();
        for (pair, yes, no) in books {
            let (yes_book, no_book) = match (yes, no) {
                (Ok(yes), Ok(no)) => (yes, no),
                (Err(e), _) | (_, Err(e)) => {
                    self.stats.book_errors += 1;
                    warn!(market = %pair.label, error = %e, "Failed to fetch order book");
                    continue;
                }
            };
            if let Some(scored) = self.evaluate(&pair, &yes_book, &no_book, now) {
                found.push(scored);
            }
        }
        found
    }

    fn evaluate(
        &mut self,
        pair: &MarketPair,
        yes_book: &OrderBook,
        no_book: &OrderBook,
        now: DateTime<Utc>,
    ) -> Option<ScoredOpportunity> {
        let Some(quotes) = BinaryQuotes::from_books(yes_book, no_book) else {
            debug!(market = %pair.label, "Incomplete quotes, skipping");
            return None;
        };
        let arb = check_arbitrage(&quotes)?;
        if !arb.is_profitable(self.settings.min_profit_threshold) {
            return None;
        }

        // Dedup/cooldown: skip if we signaled this market recently
        if let Some(last) = self.last_signal_time.get(&pair.label) {
            if (now - *last).num_seconds() < self.settings.cooldown_secs {
                self.stats.cooled_down += 1;
                return None;
            }
        }
        self.last_signal_time.insert(pair.label.clone(), now);
        self.stats.opportunities += 1;

        let legs = (arb.kind == ArbKind::Long)
            .then(|| self.score_long(&arb, yes_book, no_book, now.timestamp_millis()));

        Some(ScoredOpportunity {
            market: pair.label.clone(),
            opportunity: arb,
            legs,
        })
    }

    /// Sweep each leg up to the price at which the pair still breaks even.
    fn score_long(
        &self,
        arb: &ArbOpportunity,
        yes_book: &OrderBook,
        no_book: &OrderBook,
        at_ms: i64,
    ) -> LegScores {
        let leg = |book: &OrderBook, other_leg_price: Decimal| {
            simulate_sweep(
                &book.asks,
                &SimulationParams {
                    price_cap: Decimal::ONE - other_leg_price,
                    budget_usd: self.settings.score_budget_usd,
                    max_levels: self.settings.score_max_levels,
                    at_ms,
                },
            )
        };
        let yes = leg(yes_book, arb.prices.buy_no);
        let no = leg(no_book, arb.prices.buy_yes);
        let executable_pairs = yes.total_filled_shares.min(no.total_filled_shares);

        LegScores {
            yes,
            no,
            executable_pairs,
        }
    }
}

fn log_opportunity(scored: &ScoredOpportunity) {
    let arb = &scored.opportunity;
    match &scored.legs {
        Some(legs) => info!(
            market = %scored.market,
            profit = %arb.profit,
            yes_filled_usd = %legs.yes.total_filled_usd,
            no_filled_usd = %legs.no.total_filled_usd,
            pairs = %legs.executable_pairs,
            "ARB DETECTED: {}",
            arb.narrative
        ),
        None => info!(
            market = %scored.market,
            profit = %arb.profit,
            "ARB DETECTED (short, not executable): {}",
            arb.narrative
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use polymarket_core::types::PriceLevel;
    use polymarket_core::{Error, Result as CoreResult};

    struct StaticBooks(HashMap<String, OrderBook>);

    #[async_trait]
    impl MarketData for StaticBooks {
        async fn get_order_book(&self, token_id: &str) -> CoreResult<OrderBook> {
            self.0
                .get(token_id)
                .cloned()
                .ok_or_else(|| Error::InvalidMarket(token_id.to_string()))
        }
    }

    fn d(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn book(token: &str, ask: i64, bid: i64) -> OrderBook {
        let mut book = OrderBook::empty(token);
        book.asks = vec![PriceLevel::new(d(ask), Decimal::new(100, 0))];
        book.bids = vec![PriceLevel::new(d(bid), Decimal::new(100, 0))];
        book
    }

    fn monitor(books: Vec<OrderBook>, markets: &str) -> ArbMonitor {
        let books = books
            .into_iter()
            .map(|b| (b.outcome_id.clone(), b))
            .collect();
        let settings = MonitorSettings {
            markets: parse_market_list(markets).unwrap(),
            score_budget_usd: Decimal::new(10, 0),
            ..MonitorSettings::default()
        };
        ArbMonitor::new(settings, Arc::new(StaticBooks(books)))
    }

    #[test]
    fn test_parse_market_pairs() {
        let pairs = parse_market_list("election:111:222, 333:444,").unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].label, "election");
        assert_eq!(pairs[0].no_token, "222");
        assert_eq!(pairs[1].label, "333/444");

        assert!(parse_market_list("only-one-token").is_err());
        assert!(MarketPair::parse("a::b").is_none());
    }

    #[tokio::test]
    async fn test_long_arb_is_scored_on_both_legs() {
        let mut monitor = monitor(vec![book("y", 40, 38), book("n", 50, 48)], "m:y:n");
        let found = monitor.scan_once(Utc::now()).await;

        assert_eq!(found.len(), 1);
        let scored = &found[0];
        assert_eq!(scored.opportunity.kind, ArbKind::Long);
        assert_eq!(scored.opportunity.profit, d(10));

        let legs = scored.legs.as_ref().unwrap();
        // $10 at 0.40 and $10 at 0.50
        assert_eq!(legs.yes.total_filled_shares, Decimal::new(25, 0));
        assert_eq!(legs.no.total_filled_shares, Decimal::new(20, 0));
        assert_eq!(legs.executable_pairs, Decimal::new(20, 0));
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeat_signals() {
        let mut monitor = monitor(vec![book("y", 40, 38), book("n", 50, 48)], "m:y:n");
        let start = Utc::now();

        assert_eq!(monitor.scan_once(start).await.len(), 1);
        assert!(monitor.scan_once(start + Duration::seconds(30)).await.is_empty());
        assert_eq!(monitor.scan_once(start + Duration::seconds(61)).await.len(), 1);

        let stats = monitor.stats();
        assert_eq!(stats.scans, 3);
        assert_eq!(stats.opportunities, 2);
        assert_eq!(stats.cooled_down, 1);
    }

    #[tokio::test]
    async fn test_fair_market_and_missing_books_are_ignored() {
        let mut monitor = monitor(
            vec![book("y", 52, 50), book("n", 50, 48), book("lonely", 40, 38)],
            "fair:y:n,broken:lonely:absent",
        );
        assert!(monitor.scan_once(Utc::now()).await.is_empty());
        assert_eq!(monitor.stats().book_errors, 1);
        assert_eq!(monitor.stats().opportunities, 0);
    }

    #[tokio::test]
    async fn test_threshold_filters_thin_edges() {
        // buy sum 0.995: profit 0.005 does not clear the default 0.005
        let mut yes = book("y", 50, 40);
        yes.asks[0].price = Decimal::new(495, 3);
        let mut monitor = monitor(vec![yes, book("n", 50, 45)], "m:y:n");
        assert!(monitor.scan_once(Utc::now()).await.is_empty());
    }
}
