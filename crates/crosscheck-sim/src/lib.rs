//! In-process stand-in for the physical bench.
//!
//! One [`SimBench`] holds the shared state of the wiring between the
//! harness host and the peer device. [`SimLines`] is the host's view (a
//! [`LineDriver`](crosscheck_endpoint::LineDriver)) and [`SimPeripheral`]
//! emulates the peer firmware behind its characteristics (a
//! [`GattTransport`](crosscheck_endpoint::GattTransport)).

pub mod bench;
pub mod lines;
pub mod peripheral;
pub mod program;

pub use bench::{SimBench, SimFaults};
pub use lines::SimLines;
pub use peripheral::SimPeripheral;
pub use program::{PeerProgram, PeerStep};
