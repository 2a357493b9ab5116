//! Conformance runs across the two endpoints of a bench.
//!
//! The [`Orchestrator`] drives both test families in both directions and
//! tallies a [`RunReport`]. A [`Suite`] follows that with the timing replay
//! and combines both results into a [`SuiteReport`].

pub mod config;
pub mod orchestrator;
pub mod report;
pub mod sim;
pub mod suite;

pub use config::{ConfigError, HarnessConfig};
pub use orchestrator::{batch_vectors, Orchestrator, OrchestratorConfig, OrchestratorError};
pub use report::{FamilyTally, RunReport, SuiteReport, TestEvent, TestFamily, TestOutcome};
pub use sim::{peer_program, sim_suite, SimSuite};
pub use suite::{Suite, SuiteError};
