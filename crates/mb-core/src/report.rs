//! Console presentation of loop progress.

use std::io::{self, Write};

use crate::domain::TargetAccount;

/// Per-cycle metrics handed to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub cycles: u64,
    pub replies: u64,
    pub target: TargetAccount,
}

impl CycleReport {
    pub fn lines(&self) -> [String; 3] {
        [
            format!("Replies to {}: {}", self.target, self.replies),
            format!("Mention bot has been running for: {} cycles", self.cycles),
            format!("Currently listening for user {}...", self.target),
        ]
    }
}

/// Sink for human-readable status output.
pub trait StatusSink: Send + Sync {
    fn cycle_completed(&self, report: &CycleReport);

    fn failure(&self, message: &str);
}

/// Writes status lines to stdout and failures to stderr.
#[derive(Clone, Copy, Debug)]
pub struct ConsoleStatus {
    clear_screen: bool,
}

impl ConsoleStatus {
    /// Lines pushed before each report to scroll an 80x24 terminal clean.
    const CLEAR_LINES: usize = 25;

    pub fn new(clear_screen: bool) -> Self {
        Self { clear_screen }
    }
}

impl StatusSink for ConsoleStatus {
    fn cycle_completed(&self, report: &CycleReport) {
        let mut out = io::stdout().lock();
        if self.clear_screen {
            let _ = write!(out, "{}", "\n".repeat(Self::CLEAR_LINES));
        }
        for line in report.lines() {
            let _ = writeln!(out, "{line}");
        }
        let _ = out.flush();
    }

    fn failure(&self, message: &str) {
        eprintln!("{message}");
    }
}
