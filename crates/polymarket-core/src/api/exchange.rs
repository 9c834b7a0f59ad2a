//! Capabilities the execution engine consumes from the exchange.
//!
//! Implementations own transport, authentication and signing. The engine
//! only sees order books, fill-and-kill submissions, and order snapshots.

use async_trait::async_trait;

use crate::types::{OrderBook, OrderRequest, OrderSnapshot, PlaceOrderResponse};
use crate::Result;

/// Read access to live order books.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the current book for an outcome token.
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook>;
}

/// Order submission and status lookup.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a fill-and-kill order. Transport failures are reported through
    /// `success = false` and `error_msg`, never as an `Err`.
    async fn place_order(&self, request: &OrderRequest) -> PlaceOrderResponse;

    /// Look up an order. `Ok(None)` and `Err` both mean the fill is unknown.
    async fn get_order(&self, order_id: &str) -> Result<Option<OrderSnapshot>>;

    /// Whether `get_order` is backed by a real status endpoint.
    fn supports_status_polling(&self) -> bool {
        true
    }
}
