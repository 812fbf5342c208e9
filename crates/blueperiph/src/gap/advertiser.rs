//! Advertising state machine.
//!
//! Drives the PoweredOff -> Idle -> Advertising lifecycle from transport
//! power events and connection events. A start failure leaves the machine
//! in Idle with the error surfaced to the caller. The machine never retries
//! on its own; the next power-on event or explicit start call is the only
//! retry path.

use log::{info, warn};
use thiserror::Error;

use super::payload::{AdvertisingData, ADV_NAME_MAX};
use super::types::AdvertisingState;
use crate::error::TransportError;
use crate::transport::Transport;
use crate::uuid::Uuid;

/// Errors from advertising control and payload packing.
#[derive(Error, Debug)]
pub enum AdvertisingError {
    #[error("advertising data too long: {len} bytes (limit {limit})")]
    DataTooLong { len: usize, limit: usize },

    #[error("local name too long: {0} bytes (limit {ADV_NAME_MAX})")]
    NameTooLong(usize),

    #[error("cannot advertise while the radio is powered off")]
    PoweredOff,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The advertising state machine.
pub struct Advertiser {
    state: AdvertisingState,
    local_name: String,
    service_uuids: Vec<Uuid>,
}

impl Advertiser {
    /// Creates the machine in the PoweredOff state. `service_uuids` is the
    /// UUID list advertised alongside the local name.
    pub fn new(local_name: impl Into<String>, service_uuids: Vec<Uuid>) -> Self {
        Self {
            state: AdvertisingState::PoweredOff,
            local_name: local_name.into(),
            service_uuids,
        }
    }

    pub fn state(&self) -> AdvertisingState {
        self.state
    }

    /// Reacts to a power-on event: PoweredOff -> Idle. A start attempt is
    /// the caller's next move, not an implicit side effect here.
    pub fn on_power_on(&mut self) {
        if self.state == AdvertisingState::PoweredOff {
            info!("radio powered on");
            self.state = AdvertisingState::Idle;
        }
    }

    /// Reacts to a power-off event from any state. Best-effort stop of any
    /// active advertisement; the controller is going away regardless.
    pub fn on_power_off<T: Transport>(&mut self, transport: &mut T) {
        if self.state == AdvertisingState::Advertising {
            if let Err(e) = transport.stop_advertising() {
                warn!("stop advertising during power-off failed: {}", e);
            }
        }
        if self.state != AdvertisingState::PoweredOff {
            info!("radio powered off");
            self.state = AdvertisingState::PoweredOff;
        }
    }

    /// Starts advertising. Only legal from Idle; a transport failure leaves
    /// the machine in Idle and returns the error to the operator.
    pub fn start<T: Transport>(&mut self, transport: &mut T) -> Result<(), AdvertisingError> {
        match self.state {
            AdvertisingState::PoweredOff => Err(AdvertisingError::PoweredOff),
            AdvertisingState::Advertising => Ok(()),
            AdvertisingState::Idle => {
                let data = AdvertisingData::build(&self.local_name, &self.service_uuids)?;
                transport.start_advertising(&data)?;
                self.state = AdvertisingState::Advertising;
                info!("advertising started as {:?}", self.local_name);
                Ok(())
            }
        }
    }

    /// Reacts to an inbound connection: a peripheral stops advertising
    /// while a central is connected.
    pub fn on_connected<T: Transport>(&mut self, transport: &mut T) {
        if self.state == AdvertisingState::Advertising {
            if let Err(e) = transport.stop_advertising() {
                warn!("stop advertising on connect failed: {}", e);
            }
            info!("advertising stopped: central connected");
            self.state = AdvertisingState::Idle;
        }
    }

    /// Resumes advertising after a disconnect. Same rules as [`start`].
    ///
    /// [`start`]: Advertiser::start
    pub fn resume<T: Transport>(&mut self, transport: &mut T) -> Result<(), AdvertisingError> {
        self.start(transport)
    }
}
