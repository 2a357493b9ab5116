use std::time::Duration;

use async_trait::async_trait;
use crosscheck_signal::{Signal, SignalVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::EndpointError;
use crate::transport::{Direction, LineDriver};

/// Line numbers backing each channel, index = channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    /// Lines the harness drives (peer inputs).
    pub outputs: Vec<u32>,
    /// Lines the harness reads (peer outputs).
    pub inputs: Vec<u32>,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            outputs: vec![17, 27, 22, 23],
            inputs: vec![5, 6, 13, 19],
        }
    }
}

/// Endpoint backed by local digital lines.
///
/// Reads return the live line state and writes apply immediately; nothing
/// here waits. Writing `Unset` to a channel leaves its line untouched.
pub struct DirectHardwareEndpoint<D: LineDriver> {
    name: String,
    driver: D,
    pins: PinMap,
    configured: bool,
}

impl<D: LineDriver> DirectHardwareEndpoint<D> {
    pub fn new(name: impl Into<String>, driver: D, pins: PinMap) -> Self {
        Self {
            name: name.into(),
            driver,
            pins,
            configured: false,
        }
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn output_pin(&self, index: usize) -> Result<u32, EndpointError> {
        self.pins.outputs.get(index).copied().ok_or_else(|| {
            EndpointError::violation(
                &self.name,
                format!(
                    "channel {index} has no output line ({} mapped)",
                    self.pins.outputs.len()
                ),
            )
        })
    }

    fn input_pin(&self, index: usize) -> Result<u32, EndpointError> {
        self.pins.inputs.get(index).copied().ok_or_else(|| {
            EndpointError::violation(
                &self.name,
                format!(
                    "channel {index} has no input line ({} mapped)",
                    self.pins.inputs.len()
                ),
            )
        })
    }

    fn write_channel(&mut self, index: usize, value: Signal) -> Result<(), EndpointError> {
        let pin = self.output_pin(index)?;
        let Some(high) = value.level() else {
            return Ok(());
        };
        self.driver
            .write_line(pin, high)
            .map_err(|fault| EndpointError::transport(&self.name, fault))
    }
}

#[async_trait]
impl<D: LineDriver> Endpoint for DirectHardwareEndpoint<D> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self) -> Result<(), EndpointError> {
        let lines = self
            .pins
            .outputs
            .iter()
            .map(|&pin| (pin, Direction::Output))
            .chain(self.pins.inputs.iter().map(|&pin| (pin, Direction::Input)));

        for (pin, direction) in lines {
            self.driver
                .configure_line(pin, direction)
                .map_err(|source| EndpointError::Connection {
                    endpoint: self.name.clone(),
                    source,
                })?;
        }
        self.configured = true;
        debug!(endpoint = %self.name, pins = ?self.pins, "lines configured");
        Ok(())
    }

    async fn uninit(&mut self) {
        if !self.configured {
            return;
        }
        self.configured = false;
        if let Err(fault) = self.driver.cleanup() {
            warn!(endpoint = %self.name, %fault, "line cleanup failed");
        }
    }

    async fn set_outputs(&mut self, outputs: &SignalVector) -> Result<(), EndpointError> {
        debug!(endpoint = %self.name, %outputs, "set outputs");
        for (index, value) in outputs.iter().enumerate() {
            self.write_channel(index, value)?;
        }
        Ok(())
    }

    async fn get_inputs(&mut self) -> Result<SignalVector, EndpointError> {
        let levels = self
            .driver
            .read_lines(&self.pins.inputs)
            .map_err(|fault| EndpointError::transport(&self.name, fault))?;
        Ok(SignalVector::from_levels(&levels))
    }

    async fn set_output(&mut self, index: usize, value: Signal) -> Result<(), EndpointError> {
        debug!(endpoint = %self.name, index, %value, "set output");
        self.write_channel(index, value)
    }

    async fn before_get_input(&mut self, _index: usize) -> Result<(), EndpointError> {
        // Lines are polled, not pushed.
        Ok(())
    }

    async fn get_input(
        &mut self,
        index: usize,
        _timeout: Duration,
    ) -> Result<Option<Signal>, EndpointError> {
        let pin = self.input_pin(index)?;
        let high = self
            .driver
            .read_line(pin)
            .map_err(|fault| EndpointError::transport(&self.name, fault))?;
        Ok(Some(Signal::from_level(high)))
    }

    async fn cancel_get_input(&mut self, _index: usize) {}
}
