//! Wiring a [`Suite`] onto the simulated bench.

use crosscheck_endpoint::{DirectHardwareEndpoint, WireProtocolEndpoint};
use crosscheck_sim::{PeerProgram, SimBench, SimFaults, SimLines, SimPeripheral};
use crosscheck_timing::TimingScript;

use crate::config::HarnessConfig;
use crate::suite::Suite;

pub type SimSuite = Suite<DirectHardwareEndpoint<SimLines>, WireProtocolEndpoint<SimPeripheral>>;

/// The peer program a conforming device runs for `script`: each step's
/// state after its nominal delay, then each terminal state's successor
/// once its trigger is seen on the peer inputs.
pub fn peer_program(script: &TimingScript) -> PeerProgram {
    let program = script.steps.iter().fold(PeerProgram::new(), |program, step| {
        program.sleep(step.nominal()).drive(step.expect.clone())
    });
    script.steady_states.iter().fold(program, |program, check| {
        program
            .await_inputs(check.trigger.clone())
            .drive(check.next.clone())
    })
}

/// A suite over a fresh simulated bench wired per `config`, whose peer
/// runs `script` once a program is uploaded.
pub fn sim_suite(config: HarnessConfig, script: &TimingScript, faults: SimFaults) -> (SimSuite, SimBench) {
    let bench = SimBench::new(config.lines.clone())
        .with_faults(faults)
        .with_program(peer_program(script));
    let hardware = DirectHardwareEndpoint::new("hardware", bench.lines(), config.lines.clone());
    let peer = WireProtocolEndpoint::new(
        "peer",
        bench.peripheral(&config.peripheral),
        config.peripheral.clone(),
    );
    (Suite::new(hardware, peer, config), bench)
}
