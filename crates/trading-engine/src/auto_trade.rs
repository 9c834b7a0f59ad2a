//! Auto-trade orchestration: policy, dedup, sizing, rate control and dispatch.

mod config;
mod history;
mod pending;
mod trader;

pub use config::{
    AutoTradeConfig, ExecutionStyle, PaperConfig, PaperFillRule, SweepConfig, SweepEngine, TradeMode,
};
pub use history::{HistoryEntry, HistoryOutcome, RecentLog, SkipReason, DISPATCHED_TTL_MS};
pub use pending::{PendingState, PendingTrade, TradeSizing};
pub use trader::{AutoTradeStatus, AutoTrader, HISTORY_CAP, PENDING_CAP};
