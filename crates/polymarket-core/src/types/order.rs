//! Order types for trading execution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Case-insensitive parse of an upstream side string.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// Current status of an order as observed on the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted and still working.
    Pending,
    /// Order partially filled, remainder still working.
    PartiallyFilled,
    /// Order fully filled.
    Filled,
    /// Order cancelled (including a killed fill-and-kill remainder).
    Cancelled,
    /// Order rejected by exchange.
    Rejected,
    /// Order expired (for time-limited orders).
    Expired,
}

impl OrderStatus {
    /// Map an exchange status string onto the local lifecycle.
    pub fn from_exchange(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "live" | "open" | "delayed" | "pending" => Some(Self::Pending),
            "partially_filled" | "partial" => Some(Self::PartiallyFilled),
            "matched" | "filled" | "mined" | "confirmed" => Some(Self::Filled),
            "canceled" | "cancelled" | "unmatched" => Some(Self::Cancelled),
            "rejected" | "failed" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// No further fills can occur once an order reaches a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }
}

/// A fill-and-kill order: executes against resting liquidity up to
/// `price_cap`, any unfilled remainder is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: OrderSide,
    pub amount_usd: Decimal,
    pub price_cap: Decimal,
}

impl OrderRequest {
    pub fn buy(token_id: impl Into<String>, amount_usd: Decimal, price_cap: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side: OrderSide::Buy,
            amount_usd,
            price_cap,
        }
    }
}

/// Exchange acknowledgement of an order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderResponse {
    pub success: bool,
    pub order_id: Option<String>,
    pub error_msg: Option<String>,
}

impl PlaceOrderResponse {
    pub fn accepted(order_id: impl Into<String>) -> Self {
        Self {
            success: true,
            order_id: Some(order_id.into()),
            error_msg: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: None,
            error_msg: Some(error.into()),
        }
    }
}

/// A polled view of an order. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub status: Option<OrderStatus>,
    /// Shares filled so far.
    pub filled_size: Option<Decimal>,
    /// Execution price reported by the exchange.
    pub price: Option<Decimal>,
}

impl OrderSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.map(|s| s.is_terminal()).unwrap_or(false)
    }
}
