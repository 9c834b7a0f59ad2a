//! Exchange capabilities and API clients.

pub mod clob;
pub mod exchange;

pub use clob::ClobClient;
pub use exchange::{MarketData, OrderGateway};

#[cfg(any(test, feature = "mocks"))]
pub use exchange::{MockMarketData, MockOrderGateway};
