//! Decision audit log and the bounded, most-recent-first buffer behind it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::config::ExecutionStyle;
use crate::sweep::StopReason;

const SECOND_MS: i64 = 1_000;
const HOUR_MS: i64 = 60 * 60 * SECOND_MS;

/// How long a dispatched suggestion stays excluded.
pub const DISPATCHED_TTL_MS: i64 = 6 * HOUR_MS;

/// Why a suggestion was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Denied,
    NotAllowed,
    SideNotSupported,
    BelowTrigger,
    #[serde(rename = "missing_tokenId")]
    MissingTokenId,
    BadPrice,
    ZeroBudget,
    ZeroSize,
    RateLimited,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Denied => "denied",
            Self::NotAllowed => "not_allowed",
            Self::SideNotSupported => "side_not_supported",
            Self::BelowTrigger => "below_trigger",
            Self::MissingTokenId => "missing_tokenId",
            Self::BadPrice => "bad_price",
            Self::ZeroBudget => "zero_budget",
            Self::ZeroSize => "zero_size",
            Self::RateLimited => "rate_limited",
        }
    }

    /// Dedup expiry for a suggestion skipped for this reason.
    pub fn dedup_ttl_ms(&self) -> i64 {
        match self {
            Self::Denied | Self::SideNotSupported => 60 * SECOND_MS,
            Self::NotAllowed
            | Self::BelowTrigger
            | Self::MissingTokenId
            | Self::BadPrice
            | Self::ZeroBudget
            | Self::ZeroSize => 30 * SECOND_MS,
            // Parked as a pending trade, so it counts as dispatched.
            Self::RateLimited => DISPATCHED_TTL_MS,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestrator did with one suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HistoryOutcome {
    Skipped {
        reason: SkipReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_id: Option<Uuid>,
    },
    Paper {
        paper_id: Uuid,
        filled_usd: Decimal,
        stop_reason: StopReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Queued {
        pending_id: Uuid,
    },
    Executed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<String>,
        filled_usd: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
    },
    Failed {
        error: String,
    },
}

impl HistoryOutcome {
    /// Counter key for the status summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { reason, .. } => reason.as_str(),
            Self::Paper { .. } => "paper",
            Self::Queued { .. } => "queued",
            Self::Executed { .. } => "executed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn dedup_ttl_ms(&self) -> i64 {
        match self {
            Self::Skipped { reason, .. } => reason.dedup_ttl_ms(),
            _ => DISPATCHED_TTL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at_ms: i64,
    pub suggestion_id: String,
    pub condition_id: String,
    pub token_id: Option<String>,
    pub style: ExecutionStyle,
    #[serde(flatten)]
    pub outcome: HistoryOutcome,
}

/// Fixed-capacity log, newest first. Pushing past capacity drops the oldest.
#[derive(Debug, Clone)]
pub struct RecentLog<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RecentLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Seed from items already ordered newest first.
    pub fn from_newest_first(items: impl IntoIterator<Item = T>, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        log.items = items.into_iter().take(log.capacity).collect();
        log
    }

    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

impl<T: Clone> RecentLog<T> {
    pub fn recent(&self, limit: usize) -> Vec<T> {
        self.items.iter().take(limit).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_log_drops_oldest() {
        let mut log = RecentLog::new(3);
        for i in 0..5 {
            log.push(i);
        }
        assert_eq!(log.to_vec(), vec![4, 3, 2]);
        assert_eq!(log.recent(2), vec![4, 3]);
    }

    #[test]
    fn test_seed_respects_capacity() {
        let log = RecentLog::from_newest_first(vec![9, 8, 7, 6], 2);
        assert_eq!(log.to_vec(), vec![9, 8]);
    }

    #[test]
    fn test_dedup_ttls_by_outcome() {
        assert_eq!(SkipReason::Denied.dedup_ttl_ms(), 60_000);
        assert_eq!(SkipReason::NotAllowed.dedup_ttl_ms(), 30_000);
        assert_eq!(SkipReason::SideNotSupported.dedup_ttl_ms(), 60_000);
        assert_eq!(SkipReason::ZeroSize.dedup_ttl_ms(), 30_000);
        assert_eq!(
            HistoryOutcome::Failed { error: "x".into() }.dedup_ttl_ms(),
            DISPATCHED_TTL_MS
        );
    }

    #[test]
    fn test_entry_wire_format() {
        let entry = HistoryEntry {
            at_ms: 5,
            suggestion_id: "s".into(),
            condition_id: "c".into(),
            token_id: None,
            style: ExecutionStyle::Copy,
            outcome: HistoryOutcome::Skipped {
                reason: SkipReason::MissingTokenId,
                pending_id: None,
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "missing_tokenId");
    }
}
