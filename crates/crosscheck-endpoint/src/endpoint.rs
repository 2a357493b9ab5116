use std::time::Duration;

use async_trait::async_trait;
use crosscheck_signal::{Signal, SignalVector};

use crate::error::EndpointError;

/// Capability set shared by both peers under test.
///
/// Every operation is asynchronous at the interface even where a variant
/// resolves immediately. Hooks a variant does not need are implemented as
/// explicit no-ops; there are no default bodies.
#[async_trait]
pub trait Endpoint: Send {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Establish readiness. Fails with [`EndpointError::Connection`] when the
    /// transport cannot be brought up.
    async fn init(&mut self) -> Result<(), EndpointError>;

    /// Release resources. Idempotent; failures are logged, never returned.
    async fn uninit(&mut self);

    /// Drive all channels with one transport operation.
    async fn set_outputs(&mut self, outputs: &SignalVector) -> Result<(), EndpointError>;

    /// Read all channels as one snapshot.
    async fn get_inputs(&mut self) -> Result<SignalVector, EndpointError>;

    /// Drive one channel.
    async fn set_output(&mut self, index: usize, value: Signal) -> Result<(), EndpointError>;

    /// Arm out-of-band synchronization for a following [`Endpoint::get_input`].
    async fn before_get_input(&mut self, index: usize) -> Result<(), EndpointError>;

    /// Read one channel, waiting at most `timeout` where the variant waits at
    /// all. `Ok(None)` means the channel carried no value.
    async fn get_input(
        &mut self,
        index: usize,
        timeout: Duration,
    ) -> Result<Option<Signal>, EndpointError>;

    /// Withdraw a read armed by [`Endpoint::before_get_input`] that will not
    /// be awaited.
    async fn cancel_get_input(&mut self, index: usize);
}

/// Endpoints that accept a compiled timing program.
#[async_trait]
pub trait ProgramUpload: Endpoint {
    async fn upload_program(&mut self, payload: &[u8]) -> Result<(), EndpointError>;
}
