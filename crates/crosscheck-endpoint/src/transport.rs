//! Capabilities the endpoints consume from their physical transports.
//!
//! Concrete transports (a GPIO character device, a BLE central) live outside
//! this crate and are injected into the endpoint variants.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A failed transport operation, as reported by the transport itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportFault {
    pub message: String,
}

impl TransportFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// Digital line access on the harness host.
///
/// Calls complete immediately; there is nothing to await on a local line.
pub trait LineDriver: Send {
    fn configure_line(&mut self, pin: u32, direction: Direction) -> Result<(), TransportFault>;

    fn write_line(&mut self, pin: u32, high: bool) -> Result<(), TransportFault>;

    fn read_line(&mut self, pin: u32) -> Result<bool, TransportFault>;

    /// Read several lines as one snapshot, in `pins` order.
    fn read_lines(&mut self, pins: &[u32]) -> Result<Vec<bool>, TransportFault>;

    /// Release every configured line.
    fn cleanup(&mut self) -> Result<(), TransportFault>;
}

/// Callback invoked with the raw characteristic value on every notification.
///
/// Runs on the transport's delivery path, concurrently with the task that
/// drives the endpoint.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Characteristic-based connection to the peer device.
#[async_trait]
pub trait GattTransport: Send {
    async fn connect(&mut self, address: &str, timeout: Duration) -> Result<(), TransportFault>;

    async fn disconnect(&mut self) -> Result<(), TransportFault>;

    async fn write_characteristic(&mut self, uuid: Uuid, value: &[u8])
        -> Result<(), TransportFault>;

    async fn read_characteristic(&mut self, uuid: Uuid) -> Result<Vec<u8>, TransportFault>;

    async fn subscribe_notifications(
        &mut self,
        uuid: Uuid,
        handler: NotificationHandler,
    ) -> Result<(), TransportFault>;
}
