//! Trades parked for approval or deferred by the hourly window.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::{ExecutionStyle, SweepConfig};
use crate::error::{AutoTradeError, Result};
use crate::sweep::SweepResult;

/// Notional and limit price chosen for a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSizing {
    pub amount_usd: Decimal,
    pub price_cap: Decimal,
    pub leader_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PendingState {
    Pending,
    Executed {
        resolved_at_ms: i64,
        order_id: Option<String>,
        filled_usd: Decimal,
    },
    Failed {
        resolved_at_ms: i64,
        error: String,
    },
    Skipped {
        resolved_at_ms: i64,
        reason: String,
    },
}

impl PendingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed { .. } => "executed",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTrade {
    pub id: Uuid,
    pub created_at_ms: i64,
    pub suggestion_id: String,
    pub condition_id: String,
    pub token_id: String,
    pub title: String,
    pub sizing: TradeSizing,
    pub style: ExecutionStyle,
    /// Sweep settings captured at enqueue time; `None` for copy style.
    pub sweep: Option<SweepConfig>,
    #[serde(flatten)]
    pub state: PendingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SweepResult>,
}

impl PendingTrade {
    pub fn is_open(&self) -> bool {
        self.state == PendingState::Pending
    }

    pub fn order_id(&self) -> Option<&str> {
        match &self.state {
            PendingState::Executed { order_id, .. } => order_id.as_deref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            PendingState::Failed { error, .. } => Some(error),
            PendingState::Skipped { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Move out of `pending`. Resolved trades never change again.
    pub fn resolve(&mut self, next: PendingState) -> Result<()> {
        if !self.is_open() {
            return Err(AutoTradeError::PendingNotOpen {
                id: self.id.to_string(),
                state: self.state.as_str().to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}
