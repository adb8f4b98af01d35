/// Number of failures after which the bot halts for good.
pub const FAILURE_BUDGET: u32 = 5;

/// Cumulative failure counter. Never resets; once exhausted it stays exhausted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureTracker {
    count: u32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold,
        }
    }

    /// Record one failure and return the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn remaining(&self) -> u32 {
        self.threshold.saturating_sub(self.count)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.count >= self.threshold
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(FAILURE_BUDGET)
    }
}
