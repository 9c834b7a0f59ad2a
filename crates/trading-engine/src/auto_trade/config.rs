//! Auto-trade policy and execution settings.

use polymarket_core::types::TradeSuggestion;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use crate::burst::{DEFAULT_BURST_CONCURRENCY, DEFAULT_MAX_ROUNDS, MAX_BURST_CONCURRENCY};
use crate::poller::PollConfig;

/// What happens to a suggestion that passes policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMode {
    /// Park it as a pending trade awaiting approval.
    #[default]
    Queue,
    /// Execute immediately, subject to the hourly window.
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStyle {
    /// One limit order at the leader's price plus a buffer.
    #[default]
    Copy,
    /// Depth-aware sweep up to a fixed price cap.
    Sweep,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperFillRule {
    /// Fill against the best ask level only.
    Touch,
    /// Fill across up to `book_levels` levels.
    #[default]
    Sweep,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepEngine {
    #[default]
    Sequential,
    Burst,
}

macro_rules! impl_from_str {
    ($ty:ty, $($name:literal => $variant:expr),+ $(,)?) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($ty))),
                }
            }
        }
    };
}

impl_from_str!(TradeMode, "queue" => TradeMode::Queue, "auto" => TradeMode::Auto);
impl_from_str!(ExecutionStyle, "copy" => ExecutionStyle::Copy, "sweep" => ExecutionStyle::Sweep);
impl_from_str!(PaperFillRule, "touch" => PaperFillRule::Touch, "sweep" => PaperFillRule::Sweep);
impl_from_str!(SweepEngine, "sequential" => SweepEngine::Sequential, "burst" => SweepEngine::Burst);

/// Paper-trading settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub enabled: bool,
    pub fill_rule: PaperFillRule,
    pub book_levels: usize,
    /// Minimum filled share of the budget, in percent.
    pub min_fill_pct: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fill_rule: PaperFillRule::Sweep,
            book_levels: 10,
            min_fill_pct: Decimal::ZERO,
        }
    }
}

impl PaperConfig {
    /// Levels the simulator may consume under the configured fill rule.
    pub fn simulated_levels(&self) -> usize {
        match self.fill_rule {
            PaperFillRule::Touch => 1,
            PaperFillRule::Sweep => self.book_levels,
        }
    }
}

/// Sweep-style sizing and executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub price_cap: Decimal,
    /// Best ask must reach this before a sweep is attempted. Zero disables.
    pub trigger_price: Decimal,
    /// Per-event budget in USD.
    pub budget_usd: Decimal,
    pub max_orders: usize,
    pub max_levels: usize,
    /// Pause between orders (sequential) or rounds (burst).
    pub interval_ms: u64,
    pub engine: SweepEngine,
    pub concurrency: usize,
    pub max_rounds: u32,
    pub window_ms: Option<u64>,
    pub orders_per_round: Option<usize>,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            price_cap: Decimal::new(95, 2),
            trigger_price: Decimal::ZERO,
            budget_usd: Decimal::new(50, 0),
            max_orders: 10,
            max_levels: 10,
            interval_ms: 250,
            engine: SweepEngine::Sequential,
            concurrency: DEFAULT_BURST_CONCURRENCY,
            max_rounds: DEFAULT_MAX_ROUNDS,
            window_ms: None,
            orders_per_round: None,
            poll_interval_ms: 500,
            poll_timeout_ms: 10_000,
        }
    }
}

impl SweepConfig {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_millis(self.poll_timeout_ms),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// The single auto-trade configuration. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTradeConfig {
    pub enabled: bool,
    pub mode: TradeMode,
    pub style: ExecutionStyle,
    pub allow_conditions: HashSet<String>,
    pub deny_conditions: HashSet<String>,
    /// Lowercased category names.
    pub allow_categories: HashSet<String>,
    /// Added to the leader price for copy-style orders.
    pub price_buffer: Decimal,
    pub max_orders_per_hour: u32,
    pub paper: PaperConfig,
    pub sweep: SweepConfig,
}

impl Default for AutoTradeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: TradeMode::Queue,
            style: ExecutionStyle::Copy,
            allow_conditions: HashSet::new(),
            deny_conditions: HashSet::new(),
            allow_categories: HashSet::new(),
            price_buffer: Decimal::new(1, 2),
            max_orders_per_hour: 20,
            paper: PaperConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl AutoTradeConfig {
    /// Load from `AUTO_TRADE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = EnvLookup(&lookup);
        let defaults = Self::default();
        let paper = PaperConfig::default();
        let sweep = SweepConfig::default();

        Self {
            enabled: env.flag("AUTO_TRADE_ENABLED").unwrap_or(defaults.enabled),
            mode: env.parse("AUTO_TRADE_MODE").unwrap_or(defaults.mode),
            style: env.parse("AUTO_TRADE_STYLE").unwrap_or(defaults.style),
            allow_conditions: env.list("AUTO_TRADE_ALLOW"),
            deny_conditions: env.list("AUTO_TRADE_DENY"),
            allow_categories: env.list("AUTO_TRADE_CATEGORIES"),
            price_buffer: env.parse("AUTO_TRADE_PRICE_BUFFER").unwrap_or(defaults.price_buffer),
            max_orders_per_hour: env
                .parse("AUTO_TRADE_MAX_ORDERS_PER_HOUR")
                .unwrap_or(defaults.max_orders_per_hour),
            paper: PaperConfig {
                enabled: env.flag("AUTO_TRADE_PAPER").unwrap_or(paper.enabled),
                fill_rule: env.parse("AUTO_TRADE_PAPER_FILL_RULE").unwrap_or(paper.fill_rule),
                book_levels: env.parse("AUTO_TRADE_PAPER_BOOK_LEVELS").unwrap_or(paper.book_levels),
                min_fill_pct: env.parse("AUTO_TRADE_PAPER_MIN_FILL_PCT").unwrap_or(paper.min_fill_pct),
            },
            sweep: SweepConfig {
                price_cap: env.parse("AUTO_TRADE_SWEEP_PRICE_CAP").unwrap_or(sweep.price_cap),
                trigger_price: env.parse("AUTO_TRADE_SWEEP_TRIGGER").unwrap_or(sweep.trigger_price),
                budget_usd: env.parse("AUTO_TRADE_SWEEP_BUDGET").unwrap_or(sweep.budget_usd),
                max_orders: env.parse("AUTO_TRADE_SWEEP_MAX_ORDERS").unwrap_or(sweep.max_orders),
                max_levels: env.parse("AUTO_TRADE_SWEEP_MAX_LEVELS").unwrap_or(sweep.max_levels),
                interval_ms: env.parse("AUTO_TRADE_SWEEP_INTERVAL_MS").unwrap_or(sweep.interval_ms),
                engine: env.parse("AUTO_TRADE_SWEEP_ENGINE").unwrap_or(sweep.engine),
                concurrency: env.parse("AUTO_TRADE_SWEEP_CONCURRENCY").unwrap_or(sweep.concurrency),
                max_rounds: env.parse("AUTO_TRADE_SWEEP_MAX_ROUNDS").unwrap_or(sweep.max_rounds),
                window_ms: env.parse("AUTO_TRADE_SWEEP_WINDOW_MS"),
                orders_per_round: env.parse("AUTO_TRADE_SWEEP_ORDERS_PER_ROUND"),
                poll_interval_ms: env
                    .parse("AUTO_TRADE_SWEEP_POLL_INTERVAL_MS")
                    .unwrap_or(sweep.poll_interval_ms),
                poll_timeout_ms: env
                    .parse("AUTO_TRADE_SWEEP_POLL_TIMEOUT_MS")
                    .unwrap_or(sweep.poll_timeout_ms),
            },
        }
        .sanitized()
    }

    /// Clamp every field into its accepted range and normalise the sets.
    pub fn sanitized(mut self) -> Self {
        let cents = |v: i64| Decimal::new(v, 2);

        self.allow_conditions = normalize_ids(self.allow_conditions);
        self.deny_conditions = normalize_ids(self.deny_conditions);
        self.allow_categories = self
            .allow_categories
            .into_iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        self.price_buffer = self.price_buffer.clamp(Decimal::ZERO, cents(20));
        self.max_orders_per_hour = self.max_orders_per_hour.clamp(1, 1_000);

        self.paper.book_levels = self.paper.book_levels.clamp(1, 50);
        self.paper.min_fill_pct = self.paper.min_fill_pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);

        let sweep = &mut self.sweep;
        sweep.price_cap = sweep.price_cap.clamp(cents(1), cents(99));
        sweep.trigger_price = sweep.trigger_price.clamp(Decimal::ZERO, cents(99));
        sweep.budget_usd = sweep.budget_usd.clamp(Decimal::ZERO, Decimal::new(100_000, 0));
        sweep.max_orders = sweep.max_orders.clamp(1, 200);
        sweep.max_levels = sweep.max_levels.clamp(1, 50);
        sweep.interval_ms = sweep.interval_ms.min(60_000);
        sweep.concurrency = sweep.concurrency.clamp(1, MAX_BURST_CONCURRENCY);
        sweep.max_rounds = sweep.max_rounds.clamp(1, 100);
        sweep.window_ms = sweep.window_ms.map(|w| w.min(3_600_000));
        sweep.orders_per_round = sweep.orders_per_round.map(|n| n.clamp(1, 200));
        sweep.poll_interval_ms = sweep.poll_interval_ms.clamp(50, 10_000);
        sweep.poll_timeout_ms = sweep.poll_timeout_ms.min(120_000);

        self
    }

    /// Live auto mode places real orders and needs a gateway.
    pub fn requires_credential(&self) -> bool {
        self.enabled && self.mode == TradeMode::Auto && !self.paper.enabled
    }

    pub fn is_denied(&self, suggestion: &TradeSuggestion) -> bool {
        self.deny_conditions.contains(&suggestion.condition_id)
    }

    /// Allowed by explicit condition id or by category.
    pub fn is_allowed(&self, suggestion: &TradeSuggestion) -> bool {
        self.allow_conditions.contains(&suggestion.condition_id)
            || suggestion
                .category
                .as_ref()
                .is_some_and(|c| self.allow_categories.contains(c))
    }
}

struct EnvLookup<'a>(&'a dyn Fn(&str) -> Option<String>);

impl EnvLookup<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.get(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    }

    fn list(&self, key: &str) -> HashSet<String> {
        self.get(key)
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }
}

fn normalize_ids(ids: HashSet<String>) -> HashSet<String> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}
