//! Sweep Bot: depth-aware execution for Polymarket binary markets
//!
//! This is the root crate that provides benchmark and integration-test access
//! to the internal crates. For actual functionality, use them directly:
//!
//! - `polymarket-core`: Core types, pricing model, exchange capabilities, book client
//! - `trading-engine`: Sweep simulation and execution, auto-trade orchestration, paper persistence
//! - `arb-monitor`: Opportunity scanning binary

// Re-export for benchmarks
pub use polymarket_core as core;
pub use trading_engine as trading;
