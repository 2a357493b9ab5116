//! Two-family, two-direction conformance run over a pair of endpoints.

use std::time::Duration;

use crosscheck_endpoint::{Endpoint, EndpointError};
use crosscheck_signal::{Signal, SignalVector};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::report::{RunReport, TestEvent, TestFamily, TestOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Channels exercised by both families
    pub channels: usize,
    /// Bound on each edge notification (ms)
    pub edge_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            edge_timeout_ms: 5_000,
        }
    }
}

impl OrchestratorConfig {
    pub fn edge_timeout(&self) -> Duration {
        Duration::from_millis(self.edge_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Initialization failed: {0}")]
    Init(#[source] EndpointError),

    #[error("Run aborted: {0}")]
    Aborted(#[source] EndpointError),
}

impl OrchestratorError {
    pub fn endpoint_error(&self) -> &EndpointError {
        match self {
            OrchestratorError::Init(err) | OrchestratorError::Aborted(err) => err,
        }
    }
}

/// Vectors of the batch family: all low, each channel high alone, each
/// adjacent pair high, all high, and back to all low.
pub fn batch_vectors(channels: usize) -> Vec<SignalVector> {
    let low = SignalVector::uniform(Signal::Low, channels);
    let with_high = |high: &[usize]| -> SignalVector {
        (0..channels)
            .map(|channel| Signal::from_level(high.contains(&channel)))
            .collect()
    };

    let mut vectors = vec![low.clone()];
    vectors.extend((0..channels).map(|channel| with_high(&[channel])));
    vectors.extend((1..channels).map(|channel| with_high(&[channel - 1, channel])));
    vectors.push(SignalVector::uniform(Signal::High, channels));
    vectors.push(low);
    vectors
}

/// Runs every test in both directions of the pairing `(a, b)`.
///
/// Per-test failures are tallied and never stop the run. Initialization
/// failures and fatal endpoint errors abort it; endpoints that were
/// initialized are torn down on every exit path.
pub struct Orchestrator<A, B> {
    a: A,
    b: B,
    config: OrchestratorConfig,
}

impl<A: Endpoint, B: Endpoint> Orchestrator<A, B> {
    pub fn new(a: A, b: B, config: OrchestratorConfig) -> Self {
        Self { a, b, config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Hand the endpoints back, e.g. to a timing verifier.
    pub fn into_inner(self) -> (A, B) {
        (self.a, self.b)
    }

    pub async fn run(&mut self) -> Result<RunReport, OrchestratorError> {
        self.a.init().await.map_err(OrchestratorError::Init)?;
        if let Err(err) = self.b.init().await {
            self.a.uninit().await;
            return Err(OrchestratorError::Init(err));
        }

        let result = self.exercise().await;

        self.a.uninit().await;
        self.b.uninit().await;

        match result {
            Ok(report) => {
                info!(
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "conformance run complete"
                );
                Ok(report)
            }
            Err(err) => {
                error!(error = %err, "conformance run aborted");
                Err(OrchestratorError::Aborted(err))
            }
        }
    }

    async fn exercise(&mut self) -> Result<RunReport, EndpointError> {
        let mut report = RunReport::default();
        let vectors = batch_vectors(self.config.channels);
        let timeout = self.config.edge_timeout();
        let channels = self.config.channels;

        batch_family(&mut self.a, &mut self.b, &vectors, &mut report).await?;
        batch_family(&mut self.b, &mut self.a, &vectors, &mut report).await?;

        edge_family(&mut self.a, &mut self.b, channels, timeout, &mut report).await?;
        edge_family(&mut self.b, &mut self.a, channels, timeout, &mut report).await?;

        Ok(report)
    }
}

/// Fatal errors propagate, the rest become the test's outcome.
fn failure(err: EndpointError) -> Result<TestOutcome, EndpointError> {
    if err.is_fatal() {
        return Err(err);
    }
    Ok(match err {
        EndpointError::Timeout { waited_ms, .. } => TestOutcome::TimedOut { waited_ms },
        other => TestOutcome::Error {
            reason: other.to_string(),
        },
    })
}

async fn batch_family(
    driver: &mut dyn Endpoint,
    observer: &mut dyn Endpoint,
    vectors: &[SignalVector],
    report: &mut RunReport,
) -> Result<(), EndpointError> {
    for expected in vectors {
        let (actual, outcome) = match driver.set_outputs(expected).await {
            Err(err) => (None, failure(err)?),
            Ok(()) => match observer.get_inputs().await {
                Ok(inputs) => {
                    // Lines wired beyond the exercised channels are not compared.
                    let observed = inputs.prefix(expected.len());
                    let outcome = if observed == *expected {
                        TestOutcome::Passed
                    } else {
                        TestOutcome::Mismatch
                    };
                    (Some(observed.to_string()), outcome)
                }
                Err(err) => (None, failure(err)?),
            },
        };

        report.record(TestEvent {
            family: TestFamily::BatchSignal,
            driver: driver.name().to_string(),
            observer: observer.name().to_string(),
            channel: None,
            expected: expected.to_string(),
            actual,
            outcome,
        });
    }
    Ok(())
}

async fn edge_family(
    driver: &mut dyn Endpoint,
    observer: &mut dyn Endpoint,
    channels: usize,
    timeout: Duration,
    report: &mut RunReport,
) -> Result<(), EndpointError> {
    for value in [Signal::High, Signal::Low] {
        for channel in 0..channels {
            observer.before_get_input(channel).await?;

            let (actual, outcome) = match driver.set_output(channel, value).await {
                Err(err) => {
                    observer.cancel_get_input(channel).await;
                    (None, failure(err)?)
                }
                Ok(()) => match observer.get_input(channel, timeout).await {
                    Ok(Some(observed)) if observed == value => {
                        (Some(observed.to_string()), TestOutcome::Passed)
                    }
                    Ok(Some(observed)) => (Some(observed.to_string()), TestOutcome::Mismatch),
                    Ok(None) => (Some("unavailable".to_string()), TestOutcome::Mismatch),
                    Err(err) => (None, failure(err)?),
                },
            };

            report.record(TestEvent {
                family: TestFamily::ChannelEdge,
                driver: driver.name().to_string(),
                observer: observer.name().to_string(),
                channel: Some(channel),
                expected: value.to_string(),
                actual,
                outcome,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SignalVector {
        text.parse().unwrap()
    }

    #[test]
    fn test_batch_vectors_for_four_channels() {
        let expected: Vec<SignalVector> = [
            "0000", "1000", "0100", "0010", "0001", "1100", "0110", "0011", "1111", "0000",
        ]
        .into_iter()
        .map(v)
        .collect();
        assert_eq!(batch_vectors(4), expected);
    }

    #[test]
    fn test_batch_vectors_single_channel() {
        assert_eq!(batch_vectors(1), vec![v("0"), v("1"), v("1"), v("0")]);
    }

    #[test]
    fn test_config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.channels, 4);
        assert_eq!(config.edge_timeout(), Duration::from_secs(5));
    }
}
