//! Trading Engine
//!
//! Depth-aware sweep execution (simulated, sequential and burst) and the
//! auto-trade orchestrator that decides when to use it.

pub mod auto_trade;
pub mod burst;
pub mod clock;
pub mod dedup;
pub mod depth;
pub mod error;
pub mod paper_store;
pub mod poller;
pub mod rate_limit;
pub mod sequential;
pub mod simulator;
pub mod sweep;

pub use auto_trade::{AutoTradeConfig, AutoTradeStatus, AutoTrader};
pub use burst::{BurstParams, BurstSweeper};
pub use clock::{Clock, ManualClock, SystemClock};
pub use depth::{estimate_depth, DepthEstimate};
pub use error::{AutoTradeError, StoreError};
pub use paper_store::{PaperStore, PaperTradeRecord};
pub use poller::PollConfig;
pub use sequential::{SequentialSweeper, SEQUENTIAL_DEPTH_HAIRCUT};
pub use simulator::{simulate_sweep, SimulationParams};
pub use sweep::{OrderLogEntry, StopReason, SweepParams, SweepResult, MIN_ORDER_USD};
