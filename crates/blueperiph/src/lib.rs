//! blueperiph - a BLE GATT peripheral service host
//!
//! This library hosts a single GATT service behind an injected radio
//! transport: it advertises the service, accepts one central connection at
//! a time, negotiates the ATT MTU, and routes characteristic writes (both
//! Write Request and Write Command) to application-supplied handlers.
//! Reads, notifications, security and service discovery are out of scope.

pub mod att;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod host;
pub mod session;
pub mod transport;
pub mod uuid;

// Re-export common types for convenience
pub use att::{AttError, AttErrorCode, Dispatcher};
pub use error::{HostError, TransportError};
pub use gap::{Advertiser, AdvertisingData, AdvertisingError, AdvertisingState, BdAddr};
pub use gatt::{
    CharacteristicDescriptor, CharacteristicProps, GattError, ServiceDescriptor, ServiceTable,
    WriteHandler, WriteOutcome, WriteRequestEvent,
};
pub use host::{HostConfig, PeripheralHost};
pub use session::{ConnectionSession, SessionError, SessionManager, SessionState};
pub use transport::{ConnectionId, PowerState, Transport, TransportEvent};
pub use uuid::Uuid;
