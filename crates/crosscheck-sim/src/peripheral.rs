use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crosscheck_endpoint::{GattTransport, NotificationHandler, PeripheralConfig, TransportFault};
use crosscheck_signal::{decode, encode};
use tracing::debug;
use uuid::Uuid;

use crate::bench::{lock, BenchState};

/// The peer device firmware, seen through its characteristics.
///
/// Outputs writes drive every asserted channel, inputs reads return the
/// packed peer inputs, and a change on any harness output line is notified
/// to the subscriber. A completed program upload (re)starts the bench's
/// [`PeerProgram`](crate::PeerProgram).
pub struct SimPeripheral {
    state: Arc<Mutex<BenchState>>,
    outputs: Uuid,
    inputs: Uuid,
    program: Uuid,
}

impl SimPeripheral {
    pub(crate) fn new(state: Arc<Mutex<BenchState>>, config: &PeripheralConfig) -> Self {
        Self {
            state,
            outputs: config.outputs_characteristic,
            inputs: config.inputs_characteristic,
            program: config.program_characteristic,
        }
    }

    fn connected(&self) -> Result<std::sync::MutexGuard<'_, BenchState>, TransportFault> {
        let state = lock(&self.state);
        if state.connected {
            Ok(state)
        } else {
            Err(TransportFault::new("not connected"))
        }
    }

    fn write_program_chunk(&self, chunk: &[u8]) -> Result<(), TransportFault> {
        let mut state = self.connected()?;
        let payload = state
            .assembler
            .push(chunk)
            .map_err(|err| TransportFault::new(err.to_string()))?;
        let Some(payload) = payload else {
            return Ok(());
        };

        debug!(bytes = payload.len(), "peer program uploaded");
        state.uploads.push(payload);
        state.stop_program();
        let program = state.program.clone();
        if !program.is_empty() {
            let shared = Arc::clone(&self.state);
            state.program_task = Some(tokio::spawn(program.run(shared)));
        }
        Ok(())
    }
}

#[async_trait]
impl GattTransport for SimPeripheral {
    async fn connect(&mut self, address: &str, _timeout: Duration) -> Result<(), TransportFault> {
        let mut state = lock(&self.state);
        if state.faults.refuse_connection {
            return Err(TransportFault::new(format!("{address} not reachable")));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportFault> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.handler = None;
        state.stop_program();
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        uuid: Uuid,
        value: &[u8],
    ) -> Result<(), TransportFault> {
        if uuid == self.program {
            return self.write_program_chunk(value);
        }
        if uuid != self.outputs {
            return Err(TransportFault::new(format!("{uuid} is not writable")));
        }
        let outputs = decode(value).map_err(|err| TransportFault::new(err.to_string()))?;
        self.connected()?.drive(&outputs);
        Ok(())
    }

    async fn read_characteristic(&mut self, uuid: Uuid) -> Result<Vec<u8>, TransportFault> {
        if uuid != self.inputs {
            return Err(TransportFault::new(format!("{uuid} is not readable")));
        }
        let state = self.connected()?;
        Ok(encode(state.peer_inputs().as_slice()))
    }

    async fn subscribe_notifications(
        &mut self,
        uuid: Uuid,
        handler: NotificationHandler,
    ) -> Result<(), TransportFault> {
        if uuid != self.inputs {
            return Err(TransportFault::new(format!("{uuid} does not notify")));
        }
        self.connected()?.handler = Some(handler);
        Ok(())
    }
}
