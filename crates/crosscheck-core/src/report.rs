//! Structured results of a conformance run.
//!
//! Every test produces one [`TestEvent`]; presentation is left to whoever
//! consumes the events (log subscriber, JSON report).

use crosscheck_timing::TimingReport;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFamily {
    /// Whole-vector snapshot tests.
    BatchSignal,
    /// Single-channel tests observed through edge notification.
    ChannelEdge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    /// Observed value differs from the driven one.
    Mismatch,
    /// No edge notification arrived in time.
    TimedOut { waited_ms: u64 },
    /// A transport operation failed.
    Error { reason: String },
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

/// One executed test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEvent {
    pub family: TestFamily,
    /// Endpoint that drove the value.
    pub driver: String,
    /// Endpoint expected to observe it.
    pub observer: String,
    /// Channel under test, for edge tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<usize>,
    pub expected: String,
    /// What the observer returned; `None` when nothing was read.
    pub actual: Option<String>,
    pub outcome: TestOutcome,
}

impl TestEvent {
    pub fn name(&self) -> String {
        match self.channel {
            Some(channel) => format!(
                "{} -> {} channel {channel} = {}",
                self.driver, self.observer, self.expected
            ),
            None => format!("{} -> {} {}", self.driver, self.observer, self.expected),
        }
    }
}

/// Success/failure counts for one family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl FamilyTally {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub batch: FamilyTally,
    pub edge: FamilyTally,
    pub events: Vec<TestEvent>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn family(&self, family: TestFamily) -> FamilyTally {
        match family {
            TestFamily::BatchSignal => self.batch,
            TestFamily::ChannelEdge => self.edge,
        }
    }

    /// Count the event into exactly one counter and log it.
    pub fn record(&mut self, event: TestEvent) {
        let tally = match event.family {
            TestFamily::BatchSignal => &mut self.batch,
            TestFamily::ChannelEdge => &mut self.edge,
        };
        if event.outcome.is_pass() {
            info!(test = %event.name(), "test passed");
            tally.succeeded += 1;
            self.succeeded += 1;
        } else {
            warn!(
                test = %event.name(),
                expected = %event.expected,
                actual = event.actual.as_deref().unwrap_or("-"),
                outcome = ?event.outcome,
                "test failed"
            );
            tally.failed += 1;
            self.failed += 1;
        }
        self.events.push(event);
    }
}

/// Orchestrator run plus the optional timing replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run: RunReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.run.passed() && self.timing.as_ref().map_or(true, TimingReport::passed)
    }

    pub fn failed(&self) -> usize {
        self.run.failed + self.timing.as_ref().map_or(0, |timing| timing.failed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
