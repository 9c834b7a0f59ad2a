//! Polymarket Core Library
//!
//! Shared types, the mirrored-orderbook pricing model, and the exchange
//! capabilities consumed by the sweep execution engine.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
