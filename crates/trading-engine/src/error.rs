//! Errors raised synchronously by the auto-trade control surface.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutoTradeError {
    #[error("live auto mode requires an order gateway; enable paper mode or install credentials")]
    LiveWithoutCredential,

    #[error("no order gateway installed")]
    NoGateway,

    #[error("pending trade not found: {0}")]
    PendingNotFound(String),

    #[error("pending trade {id} is already {state}")]
    PendingNotOpen { id: String, state: String },

    #[error("hourly order limit reached ({0}/hour)")]
    RateLimited(u32),
}

pub type Result<T> = std::result::Result<T, AutoTradeError>;

/// Paper history persistence failures. Reported as a last-error string by
/// the store; never fatal to trading.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
