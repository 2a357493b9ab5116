use std::sync::{Arc, Mutex};
use std::time::Duration;

use crosscheck_signal::SignalVector;
use tracing::trace;

use crate::bench::{lock, BenchState};

/// How often a waiting peer program samples its inputs.
const INPUT_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub enum PeerStep {
    Sleep(Duration),
    Drive(SignalVector),
    /// Block until the peer's first inputs equal the vector.
    AwaitInputs(SignalVector),
}

/// A time-driven program for the simulated peer, standing in for the
/// compiled payload a real peer would execute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerProgram {
    steps: Vec<PeerStep>,
}

impl PeerProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleep(mut self, duration: Duration) -> Self {
        self.steps.push(PeerStep::Sleep(duration));
        self
    }

    pub fn drive(mut self, outputs: SignalVector) -> Self {
        self.steps.push(PeerStep::Drive(outputs));
        self
    }

    pub fn await_inputs(mut self, inputs: SignalVector) -> Self {
        self.steps.push(PeerStep::AwaitInputs(inputs));
        self
    }

    pub fn steps(&self) -> &[PeerStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) async fn run(self, state: Arc<Mutex<BenchState>>) {
        for step in self.steps {
            trace!(?step, "peer program step");
            match step {
                PeerStep::Sleep(duration) => tokio::time::sleep(duration).await,
                PeerStep::Drive(outputs) => {
                    lock(&state).drive(&outputs);
                }
                PeerStep::AwaitInputs(expected) => loop {
                    let reached = lock(&state).peer_inputs().prefix(expected.len()) == expected;
                    if reached {
                        break;
                    }
                    tokio::time::sleep(INPUT_POLL).await;
                },
            }
        }
    }
}
