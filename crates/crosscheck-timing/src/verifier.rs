//! Scripted replay of a timing program against the hardware endpoint.

use std::time::Duration;

use crosscheck_endpoint::{Endpoint, EndpointError, ProgramUpload};
use crosscheck_signal::{Signal, SignalVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::poll::{await_state, AwaitError};
use crate::script::{ScriptError, ScriptStep, SteadyStateCheck, TimingScript};
use crate::window::{millis, TimingViolation, Window};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between two input samples (ms, below 10)
    pub poll_interval_ms: u64,
    /// Tolerance either side of a step's nominal delay (ms)
    pub margin_ms: u64,
    /// How long a terminal state must hold untriggered (ms)
    pub hold_ms: u64,
    /// Exclusive upper bound for the reaction to a trigger (ms)
    pub trigger_max_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2,
            margin_ms: 20,
            hold_ms: 250,
            trigger_max_ms: 5,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn margin(&self) -> Duration {
        Duration::from_millis(self.margin_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn trigger_max(&self) -> Duration {
        Duration::from_millis(self.trigger_max_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Premature,
    Late,
    TimedOut { last_observed: Option<SignalVector> },
    /// A terminal state changed before it was triggered.
    NotHeld,
    Failed { reason: String },
}

impl StepOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, StepOutcome::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub label: String,
    pub expected: SignalVector,
    pub min_ms: u64,
    pub max_ms: u64,
    pub elapsed_ms: Option<u64>,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    pub records: Vec<StepRecord>,
    pub succeeded: usize,
    pub failed: usize,
}

impl TimingReport {
    pub fn passed(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, record: StepRecord) {
        if record.outcome.is_pass() {
            info!(label = %record.label, elapsed_ms = ?record.elapsed_ms, "timing step passed");
            self.succeeded += 1;
        } else {
            warn!(
                label = %record.label,
                expected = %record.expected,
                min_ms = record.min_ms,
                max_ms = record.max_ms,
                elapsed_ms = ?record.elapsed_ms,
                outcome = ?record.outcome,
                "timing step failed"
            );
            self.failed += 1;
        }
        self.records.push(record);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("Timing replay aborted: {0}")]
    Aborted(#[from] EndpointError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Replays a [`TimingScript`] against the hardware endpoint while the peer
/// endpoint runs the uploaded program.
pub struct TimingVerifier<H, P> {
    hardware: H,
    peer: P,
    config: TimingConfig,
}

impl<H: Endpoint, P: ProgramUpload> TimingVerifier<H, P> {
    pub fn new(hardware: H, peer: P, config: TimingConfig) -> Self {
        Self {
            hardware,
            peer,
            config,
        }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    pub fn into_inner(self) -> (H, P) {
        (self.hardware, self.peer)
    }

    /// Initialize both endpoints, replay `script` after uploading `payload`,
    /// and tear down again. Endpoint failures that are fatal abort the
    /// replay; everything else is recorded in the report.
    pub async fn run(
        &mut self,
        script: &TimingScript,
        payload: &[u8],
    ) -> Result<TimingReport, VerifierError> {
        script.validate()?;

        self.hardware.init().await?;
        if let Err(err) = self.peer.init().await {
            self.hardware.uninit().await;
            return Err(err.into());
        }

        let result = self.replay(script, payload).await;

        self.peer.uninit().await;
        self.hardware.uninit().await;

        if let Err(err) = &result {
            error!(error = %err, "timing replay aborted");
        }
        result
    }

    async fn replay(
        &mut self,
        script: &TimingScript,
        payload: &[u8],
    ) -> Result<TimingReport, VerifierError> {
        let mut report = TimingReport::default();

        self.hardware
            .set_outputs(&SignalVector::uniform(Signal::Low, script.channels))
            .await?;
        self.peer.upload_program(payload).await?;
        debug!(bytes = payload.len(), steps = script.steps.len(), "timing program uploaded");

        for step in &script.steps {
            let record = self.check_step(step).await?;
            report.record(record);
        }
        for check in &script.steady_states {
            self.check_steady_state(check, &mut report).await?;
        }
        Ok(report)
    }

    async fn check_step(&mut self, step: &ScriptStep) -> Result<StepRecord, EndpointError> {
        let window = Window::around(step.nominal(), self.config.margin());
        self.check_transition(step.name(), &step.expect, window).await
    }

    /// Await `target` within `window.max` and judge the elapsed time.
    async fn check_transition(
        &mut self,
        label: String,
        target: &SignalVector,
        window: Window,
    ) -> Result<StepRecord, EndpointError> {
        let result = await_state(
            &mut self.hardware,
            target,
            window.max,
            self.config.poll_interval(),
        )
        .await;

        let (elapsed_ms, outcome) = match result {
            Ok(elapsed) => {
                let outcome = match window.check(elapsed) {
                    Ok(()) => StepOutcome::Passed,
                    Err(TimingViolation::Premature { .. }) => StepOutcome::Premature,
                    Err(TimingViolation::Late { .. }) => StepOutcome::Late,
                };
                (Some(millis(elapsed)), outcome)
            }
            Err(AwaitError::Timeout {
                last_observed,
                waited_ms,
                ..
            }) => (Some(waited_ms), StepOutcome::TimedOut { last_observed }),
            Err(AwaitError::Endpoint(err)) => endpoint_failure(err)?,
        };

        Ok(StepRecord {
            label,
            expected: target.clone(),
            min_ms: millis(window.min),
            max_ms: millis(window.max),
            elapsed_ms,
            outcome,
        })
    }

    async fn check_steady_state(
        &mut self,
        check: &SteadyStateCheck,
        report: &mut TimingReport,
    ) -> Result<(), EndpointError> {
        let confirm = self
            .check_transition(
                format!("{} reached", check.held),
                &check.held,
                Window::within(self.config.margin()),
            )
            .await?;
        report.record(confirm);

        report.record(self.check_held(check).await?);

        let triggered = match self.hardware.set_outputs(&check.trigger).await {
            Ok(()) => {
                self.check_transition(
                    format!("{} after trigger {}", check.next, check.trigger),
                    &check.next,
                    Window::before(self.config.trigger_max()),
                )
                .await?
            }
            Err(err) => {
                let (elapsed_ms, outcome) = endpoint_failure(err)?;
                StepRecord {
                    label: format!("trigger {}", check.trigger),
                    expected: check.next.clone(),
                    min_ms: 0,
                    max_ms: self.config.trigger_max_ms,
                    elapsed_ms,
                    outcome,
                }
            }
        };
        report.record(triggered);
        Ok(())
    }

    /// The untriggered next state must not appear within the hold period.
    async fn check_held(&mut self, check: &SteadyStateCheck) -> Result<StepRecord, EndpointError> {
        let hold = self.config.hold();
        let result = await_state(
            &mut self.hardware,
            &check.next,
            hold,
            self.config.poll_interval(),
        )
        .await;

        let (elapsed_ms, outcome) = match result {
            Ok(elapsed) => (Some(millis(elapsed)), StepOutcome::NotHeld),
            Err(AwaitError::Timeout { waited_ms, .. }) => (Some(waited_ms), StepOutcome::Passed),
            Err(AwaitError::Endpoint(err)) => endpoint_failure(err)?,
        };

        Ok(StepRecord {
            label: format!("{} held", check.held),
            expected: check.held.clone(),
            min_ms: millis(hold),
            max_ms: millis(hold),
            elapsed_ms,
            outcome,
        })
    }
}

/// Fatal endpoint errors propagate; the rest become a failed record.
fn endpoint_failure(err: EndpointError) -> Result<(Option<u64>, StepOutcome), EndpointError> {
    if err.is_fatal() {
        return Err(err);
    }
    Ok((
        None,
        StepOutcome::Failed {
            reason: err.to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TimingConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(2));
        assert_eq!(config.trigger_max(), Duration::from_millis(5));
    }

    #[test]
    fn test_config_partial_json() {
        let config: TimingConfig = serde_json::from_str(r#"{ "margin_ms": 40 }"#).unwrap();
        assert_eq!(config.margin_ms, 40);
        assert_eq!(config.hold_ms, 250);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let outcome = StepOutcome::TimedOut {
            last_observed: Some("10".parse().unwrap()),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"timed_out","last_observed":"[1, 0]"}"#);
    }
}
