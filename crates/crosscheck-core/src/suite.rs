use crosscheck_endpoint::{Endpoint, ProgramUpload};
use crosscheck_timing::{TimingScript, TimingVerifier, VerifierError};
use tracing::info;

use crate::config::HarnessConfig;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::report::SuiteReport;

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Timing(#[from] VerifierError),
}

/// The full sequence: conformance run over `(hardware, peer)`, then the
/// timing replay reusing the same two endpoints.
pub struct Suite<H, P> {
    hardware: H,
    peer: P,
    config: HarnessConfig,
}

impl<H: Endpoint, P: ProgramUpload> Suite<H, P> {
    pub fn new(hardware: H, peer: P, config: HarnessConfig) -> Self {
        Self {
            hardware,
            peer,
            config,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs the orchestrator, then uploads `payload` and replays `script`.
    pub async fn run(self, script: &TimingScript, payload: &[u8]) -> Result<SuiteReport, SuiteError> {
        self.execute(Some((script, payload))).await
    }

    /// Runs the orchestrator only.
    pub async fn run_conformance(self) -> Result<SuiteReport, SuiteError> {
        self.execute(None).await
    }

    async fn execute(
        self,
        timing: Option<(&TimingScript, &[u8])>,
    ) -> Result<SuiteReport, SuiteError> {
        let Suite {
            hardware,
            peer,
            config,
        } = self;

        let mut orchestrator = Orchestrator::new(hardware, peer, config.orchestrator.clone());
        let run = orchestrator.run().await?;

        let Some((script, payload)) = timing else {
            return Ok(SuiteReport { run, timing: None });
        };

        let (hardware, peer) = orchestrator.into_inner();
        let mut verifier = TimingVerifier::new(hardware, peer, config.timing.clone());
        let timing = verifier.run(script, payload).await?;
        info!(
            succeeded = timing.succeeded,
            failed = timing.failed,
            "timing replay complete"
        );

        Ok(SuiteReport {
            run,
            timing: Some(timing),
        })
    }
}
