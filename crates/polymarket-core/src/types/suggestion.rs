//! Trade suggestions produced upstream (copy-trading poller or arb scanner).
//!
//! Upstream payloads are loosely typed: numbers arrive as strings, keys come
//! in camelCase or snake_case, sides in any case. They are coerced once here
//! into [`TradeSuggestion`]; downstream code trusts the result.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::order::OrderSide;
use crate::{Error, Result};

/// A validated trade suggestion.
///
/// Fields the orchestrator reports on individually (`token_id`, prices,
/// amounts) stay optional so a bad value becomes a recorded skip reason
/// rather than an ingress failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSuggestion {
    pub id: String,
    pub condition_id: String,
    pub token_id: Option<String>,
    /// `None` when upstream sent a side this engine does not recognise.
    pub side: Option<OrderSide>,
    pub leader_price: Option<Decimal>,
    /// Upstream-capped notional in USD.
    pub sized_amount: Option<Decimal>,
    /// Lowercased, trimmed.
    pub category: Option<String>,
    pub title: String,
}

impl TradeSuggestion {
    /// Convenience constructor for a well-formed BUY suggestion.
    pub fn buy(
        id: impl Into<String>,
        condition_id: impl Into<String>,
        token_id: impl Into<String>,
        leader_price: Decimal,
        sized_amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            condition_id: condition_id.into(),
            token_id: Some(token_id.into()),
            side: Some(OrderSide::Buy),
            leader_price: Some(leader_price),
            sized_amount: Some(sized_amount),
            category: None,
            title: String::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = normalize_category(&category.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Coerce a raw upstream payload. Only a missing id is fatal.
    pub fn from_json(raw: &Value) -> Result<Self> {
        let id = string_field(raw, &["id", "suggestionId", "suggestion_id"]).ok_or_else(|| {
            Error::InvalidSuggestion("suggestion has no id".to_string())
        })?;

        Ok(Self {
            id,
            condition_id: string_field(raw, &["conditionId", "condition_id", "market"])
                .unwrap_or_default(),
            token_id: string_field(raw, &["tokenId", "token_id", "asset"]),
            side: string_field(raw, &["side"]).and_then(|s| OrderSide::parse(&s)),
            leader_price: decimal_field(raw, &["leaderPrice", "leader_price", "price"]),
            sized_amount: decimal_field(raw, &["sizedAmount", "sized_amount", "amountUsd", "amount_usd"]),
            category: string_field(raw, &["category"]).and_then(|c| normalize_category(&c)),
            title: string_field(raw, &["title"]).unwrap_or_default(),
        })
    }
}

fn normalize_category(raw: &str) -> Option<String> {
    let c = raw.trim().to_lowercase();
    (!c.is_empty()).then_some(c)
}

/// First non-empty string under any of `keys`; numbers are stringified.
fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn decimal_field(raw: &Value, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|key| {
        let text = match raw.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    })
}
