use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crosscheck_endpoint::{Direction, NotificationHandler, PeripheralConfig, PinMap};
use crosscheck_signal::{encode, ProgramAssembler, Signal, SignalVector};
use tokio::task::JoinHandle;

use crate::lines::SimLines;
use crate::peripheral::SimPeripheral;
use crate::program::PeerProgram;

/// Misbehaviour injected into the simulated peer.
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    /// Every connection attempt fails.
    pub refuse_connection: bool,
    /// Input changes are never notified.
    pub mute_notifications: bool,
    /// This peer output channel stays Low whatever is written.
    pub stuck_output: Option<usize>,
}

pub(crate) struct BenchState {
    pub(crate) wiring: PinMap,
    pub(crate) directions: HashMap<u32, Direction>,
    /// Levels of the harness output lines (peer inputs).
    pub(crate) harness_levels: HashMap<u32, bool>,
    /// Levels the peer drives (harness inputs).
    pub(crate) peer_outputs: Vec<bool>,
    pub(crate) connected: bool,
    pub(crate) handler: Option<NotificationHandler>,
    pub(crate) notifications: u64,
    pub(crate) assembler: ProgramAssembler,
    pub(crate) uploads: Vec<Vec<u8>>,
    pub(crate) program: PeerProgram,
    pub(crate) program_task: Option<JoinHandle<()>>,
    pub(crate) faults: SimFaults,
}

impl BenchState {
    pub(crate) fn peer_inputs(&self) -> SignalVector {
        self.wiring
            .outputs
            .iter()
            .map(|pin| Signal::from_level(self.harness_levels.get(pin).copied().unwrap_or(false)))
            .collect()
    }

    /// Apply every asserted channel of `outputs` to the peer's output lines.
    pub(crate) fn drive(&mut self, outputs: &SignalVector) {
        for (channel, signal) in outputs.iter().enumerate() {
            let (Some(high), Some(line)) = (signal.level(), self.peer_outputs.get_mut(channel))
            else {
                continue;
            };
            *line = high && self.faults.stuck_output != Some(channel);
        }
    }

    /// Set a harness output line, returning the notification owed to the
    /// subscriber when the peer's inputs changed.
    pub(crate) fn set_harness_level(
        &mut self,
        pin: u32,
        high: bool,
    ) -> Option<(NotificationHandler, Vec<u8>)> {
        let previous = self.harness_levels.insert(pin, high).unwrap_or(false);
        if previous == high || !self.connected || self.faults.mute_notifications {
            return None;
        }
        let handler = self.handler.clone()?;
        self.notifications += 1;
        Some((handler, encode(self.peer_inputs().as_slice())))
    }

    pub(crate) fn stop_program(&mut self) {
        if let Some(task) = self.program_task.take() {
            task.abort();
        }
    }
}

pub(crate) fn lock(state: &Mutex<BenchState>) -> MutexGuard<'_, BenchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared wiring between the simulated host lines and peer device.
///
/// Harness output pin `outputs[k]` drives peer input channel `k`; peer
/// output channel `k` drives harness input pin `inputs[k]`.
#[derive(Clone)]
pub struct SimBench {
    state: Arc<Mutex<BenchState>>,
}

impl SimBench {
    pub fn new(wiring: PinMap) -> Self {
        let channels = wiring.inputs.len();
        Self {
            state: Arc::new(Mutex::new(BenchState {
                wiring,
                directions: HashMap::new(),
                harness_levels: HashMap::new(),
                peer_outputs: vec![false; channels],
                connected: false,
                handler: None,
                notifications: 0,
                assembler: ProgramAssembler::new(),
                uploads: Vec::new(),
                program: PeerProgram::new(),
                program_task: None,
                faults: SimFaults::default(),
            })),
        }
    }

    pub fn with_faults(self, faults: SimFaults) -> Self {
        lock(&self.state).faults = faults;
        self
    }

    /// Program the peer runs once an upload completes.
    pub fn with_program(self, program: PeerProgram) -> Self {
        lock(&self.state).program = program;
        self
    }

    pub fn lines(&self) -> SimLines {
        SimLines::new(Arc::clone(&self.state))
    }

    pub fn peripheral(&self, config: &PeripheralConfig) -> SimPeripheral {
        SimPeripheral::new(Arc::clone(&self.state), config)
    }

    pub fn peer_inputs(&self) -> SignalVector {
        lock(&self.state).peer_inputs()
    }

    pub fn peer_outputs(&self) -> SignalVector {
        SignalVector::from_levels(&lock(&self.state).peer_outputs)
    }

    /// Program payloads received so far, in upload order.
    pub fn uploads(&self) -> Vec<Vec<u8>> {
        lock(&self.state).uploads.clone()
    }

    pub fn notifications_sent(&self) -> u64 {
        lock(&self.state).notifications
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}
