use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crosscheck_signal::{decode, encode, split_program, Signal, SignalVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::endpoint::{Endpoint, ProgramUpload};
use crate::error::EndpointError;
use crate::pending::{PendingRead, SlotError};
use crate::transport::{GattTransport, NotificationHandler};

/// Connection parameters for the wire-protocol peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    pub address: String,
    pub connect_timeout_ms: u64,
    /// Written with the packed vector the peer should drive.
    pub outputs_characteristic: Uuid,
    /// Read (and notified) with the packed vector the peer observes.
    pub inputs_characteristic: Uuid,
    /// Receives the chunked timing program.
    pub program_characteristic: Uuid,
}

impl PeripheralConfig {
    pub const DEFAULT_INPUTS: Uuid = Uuid::from_u128(0x00002a56_0000_1000_8000_00805f9b34fb);
    pub const DEFAULT_OUTPUTS: Uuid = Uuid::from_u128(0x00002a57_0000_1000_8000_00805f9b34fb);
    pub const DEFAULT_PROGRAM: Uuid = Uuid::from_u128(0x00002a58_0000_1000_8000_00805f9b34fb);
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            address: "1CF348D8-55AD-3E39-4F8F-679B29C7175E".to_string(),
            connect_timeout_ms: 10_000,
            outputs_characteristic: Self::DEFAULT_OUTPUTS,
            inputs_characteristic: Self::DEFAULT_INPUTS,
            program_characteristic: Self::DEFAULT_PROGRAM,
        }
    }
}

/// Endpoint backed by the peer device's packed-signal characteristics.
///
/// Snapshot reads go through a characteristic read. Single-channel reads are
/// edge-triggered: [`Endpoint::before_get_input`] arms a [`PendingRead`]
/// that the notification handler fulfills.
pub struct WireProtocolEndpoint<T: GattTransport> {
    name: String,
    transport: T,
    config: PeripheralConfig,
    pending: Arc<PendingRead>,
    connected: bool,
}

impl<T: GattTransport> WireProtocolEndpoint<T> {
    pub fn new(name: impl Into<String>, transport: T, config: PeripheralConfig) -> Self {
        Self {
            name: name.into(),
            transport,
            config,
            pending: Arc::new(PendingRead::new()),
            connected: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pending(&self) -> &PendingRead {
        &self.pending
    }

    fn notification_handler(&self) -> NotificationHandler {
        let pending = Arc::clone(&self.pending);
        let name = self.name.clone();
        Arc::new(move |data: &[u8]| match decode(data) {
            Ok(inputs) => {
                let kept = pending.deliver(inputs.clone());
                trace!(endpoint = %name, %inputs, kept, "notification");
            }
            Err(err) => warn!(endpoint = %name, %err, "dropping malformed notification"),
        })
    }

    async fn write_outputs(&mut self, outputs: &SignalVector) -> Result<(), EndpointError> {
        let bytes = encode(outputs.as_slice());
        debug!(endpoint = %self.name, %outputs, ?bytes, "write outputs");
        self.transport
            .write_characteristic(self.config.outputs_characteristic, &bytes)
            .await
            .map_err(|fault| EndpointError::transport(&self.name, fault))
    }
}

#[async_trait]
impl<T: GattTransport> Endpoint for WireProtocolEndpoint<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self) -> Result<(), EndpointError> {
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        self.transport
            .connect(&self.config.address, timeout)
            .await
            .map_err(|source| EndpointError::Connection {
                endpoint: self.name.clone(),
                source,
            })?;
        self.connected = true;

        let handler = self.notification_handler();
        if let Err(source) = self
            .transport
            .subscribe_notifications(self.config.inputs_characteristic, handler)
            .await
        {
            self.uninit().await;
            return Err(EndpointError::Connection {
                endpoint: self.name.clone(),
                source,
            });
        }

        debug!(endpoint = %self.name, address = %self.config.address, "connected");
        Ok(())
    }

    async fn uninit(&mut self) {
        self.pending.clear();
        if !self.connected {
            return;
        }
        self.connected = false;
        if let Err(fault) = self.transport.disconnect().await {
            warn!(endpoint = %self.name, %fault, "disconnect failed");
        }
    }

    async fn set_outputs(&mut self, outputs: &SignalVector) -> Result<(), EndpointError> {
        self.write_outputs(outputs).await
    }

    async fn get_inputs(&mut self) -> Result<SignalVector, EndpointError> {
        let bytes = self
            .transport
            .read_characteristic(self.config.inputs_characteristic)
            .await
            .map_err(|fault| EndpointError::transport(&self.name, fault))?;
        decode(&bytes).map_err(|source| EndpointError::Codec {
            endpoint: self.name.clone(),
            source,
        })
    }

    /// The peer's state of other channels is not tracked, so every channel
    /// before `index` goes out as `Unset`.
    async fn set_output(&mut self, index: usize, value: Signal) -> Result<(), EndpointError> {
        self.write_outputs(&SignalVector::single(index, value)).await
    }

    async fn before_get_input(&mut self, index: usize) -> Result<(), EndpointError> {
        self.pending.arm().map_err(|err| {
            EndpointError::violation(&self.name, format!("arming channel {index}: {err}"))
        })
    }

    async fn get_input(
        &mut self,
        index: usize,
        timeout: Duration,
    ) -> Result<Option<Signal>, EndpointError> {
        match self.pending.wait_bounded(timeout).await {
            Ok(inputs) => Ok(inputs.get(index)),
            Err(SlotError::TimedOut { waited_ms }) => Err(EndpointError::Timeout {
                endpoint: self.name.clone(),
                waited_ms,
            }),
            Err(err) => Err(EndpointError::violation(
                &self.name,
                format!("reading channel {index}: {err}"),
            )),
        }
    }

    async fn cancel_get_input(&mut self, index: usize) {
        debug!(endpoint = %self.name, index, "edge read withdrawn");
        self.pending.clear();
    }
}

#[async_trait]
impl<T: GattTransport> ProgramUpload for WireProtocolEndpoint<T> {
    async fn upload_program(&mut self, payload: &[u8]) -> Result<(), EndpointError> {
        let chunks = split_program(payload).map_err(|source| EndpointError::Codec {
            endpoint: self.name.clone(),
            source,
        })?;
        debug!(endpoint = %self.name, bytes = payload.len(), chunks = chunks.len(), "uploading program");
        for chunk in &chunks {
            self.transport
                .write_characteristic(self.config.program_characteristic, chunk)
                .await
                .map_err(|fault| EndpointError::transport(&self.name, fault))?;
        }
        Ok(())
    }
}
