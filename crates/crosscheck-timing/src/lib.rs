//! Deadline-window verification of a time-driven peer program.
//!
//! The peer runs an uploaded program that changes its outputs on a known
//! schedule. The verifier polls the harness's view of those outputs and
//! checks that each transition lands inside its accepted window.

pub mod poll;
pub mod script;
pub mod verifier;
pub mod window;

pub use poll::{await_state, AwaitError};
pub use script::{ScriptError, ScriptStep, SteadyStateCheck, TimingScript};
pub use verifier::{StepOutcome, StepRecord, TimingConfig, TimingReport, TimingVerifier, VerifierError};
pub use window::{TimingViolation, Window};
