//! Rolling one-hour admission window for live order submissions.

use std::collections::VecDeque;

pub const RATE_WINDOW_MS: i64 = 60 * 60 * 1000;

/// Execution timestamps inside the trailing hour, oldest first.
#[derive(Debug, Default, Clone)]
pub struct HourlyRateWindow {
    executions: VecDeque<i64>,
}

impl HourlyRateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop executions that are a full window old or older.
    pub fn prune(&mut self, now_ms: i64) {
        while let Some(&oldest) = self.executions.front() {
            if now_ms - oldest >= RATE_WINDOW_MS {
                self.executions.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn can_execute(&mut self, now_ms: i64, max_per_hour: u32) -> bool {
        self.prune(now_ms);
        self.executions.len() < max_per_hour as usize
    }

    pub fn record(&mut self, now_ms: i64) {
        self.executions.push_back(now_ms);
    }

    pub fn count(&mut self, now_ms: i64) -> usize {
        self.prune(now_ms);
        self.executions.len()
    }
}
