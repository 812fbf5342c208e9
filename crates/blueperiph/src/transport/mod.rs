//! Transport adapter boundary.
//!
//! The radio control interface (HCI transport, OS Bluetooth daemon, a test
//! double) is an injected capability behind the [`Transport`] trait. The
//! host never touches the radio directly; it issues typed commands through
//! the trait and reacts to the [`TransportEvent`]s the trait surfaces.

use std::time::Duration;

use crate::error::TransportError;
use crate::gap::payload::AdvertisingData;
use crate::gap::BdAddr;

#[cfg(test)]
pub(crate) mod mock;

/// Link-layer connection identifier, as carried in controller events.
pub type ConnectionId = u16;

/// Radio power state as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

/// Events surfaced by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The radio power state changed.
    PowerChanged(PowerState),
    /// A central opened a connection to us.
    ConnectionOpened { conn: ConnectionId, peer: BdAddr },
    /// A connection was torn down. `reason` is the raw controller reason
    /// code (e.g. 0x13 = remote user terminated).
    ConnectionClosed { conn: ConnectionId, reason: u8 },
    /// An inbound ATT PDU arrived on a connection.
    PduReceived { conn: ConnectionId, pdu: Vec<u8> },
}

/// The radio control interface.
///
/// Implementations translate these calls into whatever the underlying stack
/// speaks (HCI commands, D-Bus calls, a scripted sequence in tests). All
/// methods take `&mut self`: the radio is a single shared resource and the
/// host serializes access to it through one event loop.
pub trait Transport {
    /// Begin advertising with the given packed payload. The payload has
    /// already been validated against the legacy advertising length limits.
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), TransportError>;

    /// Stop advertising. Idempotent.
    fn stop_advertising(&mut self) -> Result<(), TransportError>;

    /// Send an outbound ATT PDU on a connection.
    fn send_pdu(&mut self, conn: ConnectionId, pdu: &[u8]) -> Result<(), TransportError>;

    /// Decline an inbound connection at the link layer. Used when a session
    /// is already active and a second central tries to connect.
    fn decline_connection(&mut self, conn: ConnectionId) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next event. `Ok(None)` means the
    /// timeout elapsed without an event.
    fn poll_event(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<TransportEvent>, TransportError>;
}
