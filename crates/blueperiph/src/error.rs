//! Error types for the blueperiph library.
//!
//! Each layer defines its own error enum next to its types; this module
//! holds the transport error class and the top-level host error that the
//! event loop reports.

use thiserror::Error;

/// Errors reported by the radio transport.
///
/// These are fatal to the operation that triggered them (an advertising
/// attempt, a response send) but never to the host process: the host stays
/// powered-on idle and waits for the next triggering event.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("radio unavailable: {0}")]
    RadioUnavailable(String),

    #[error("transport command timed out")]
    CommandTimeout,

    #[error("transport I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("controller rejected command: status 0x{0:02x}")]
    CommandFailed(u8),
}

/// Top-level error for the peripheral host event loop.
#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Advertising(#[from] crate::gap::AdvertisingError),

    #[error(transparent)]
    Gatt(#[from] crate::gatt::GattError),

    #[error(transparent)]
    Session(#[from] crate::session::SessionError),
}
