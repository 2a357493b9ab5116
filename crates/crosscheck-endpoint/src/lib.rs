//! The two peers under test, behind one capability interface.
//!
//! [`DirectHardwareEndpoint`] reads and writes individual digital lines;
//! [`WireProtocolEndpoint`] exchanges packed signal vectors with the peer
//! device over a characteristic-based connection. Both implement
//! [`Endpoint`], so test sequencing never branches on the variant.

pub mod endpoint;
pub mod error;
pub mod hardware;
pub mod pending;
pub mod transport;
pub mod wire;

pub use endpoint::{Endpoint, ProgramUpload};
pub use error::EndpointError;
pub use hardware::{DirectHardwareEndpoint, PinMap};
pub use pending::{PendingRead, SlotError};
pub use transport::{Direction, GattTransport, LineDriver, NotificationHandler, TransportFault};
pub use wire::{PeripheralConfig, WireProtocolEndpoint};
