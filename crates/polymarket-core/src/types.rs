//! Core domain types for the sweep bot.

pub mod arbitrage;
pub mod market;
pub mod order;
pub mod suggestion;

pub use arbitrage::*;
pub use market::*;
pub use order::*;
pub use suggestion::*;
