//! Scripted transport used by the unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::TransportError;
use crate::gap::payload::AdvertisingData;

use super::{ConnectionId, Transport, TransportEvent};

/// A transport double that replays queued events and records every command
/// the host issues.
#[derive(Default)]
pub(crate) struct MockTransport {
    pub events: VecDeque<TransportEvent>,
    pub sent: Vec<(ConnectionId, Vec<u8>)>,
    pub declined: Vec<ConnectionId>,
    pub adv_starts: usize,
    pub adv_stops: usize,
    pub advertising: bool,
    pub last_adv_data: Option<AdvertisingData>,
    /// When set, the next start_advertising call fails.
    pub fail_next_adv_start: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }
}

impl Transport for MockTransport {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), TransportError> {
        if self.fail_next_adv_start {
            self.fail_next_adv_start = false;
            return Err(TransportError::CommandFailed(0x0c));
        }
        self.adv_starts += 1;
        self.advertising = true;
        self.last_adv_data = Some(data.clone());
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.adv_stops += 1;
        self.advertising = false;
        Ok(())
    }

    fn send_pdu(&mut self, conn: ConnectionId, pdu: &[u8]) -> Result<(), TransportError> {
        self.sent.push((conn, pdu.to_vec()));
        Ok(())
    }

    fn decline_connection(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        self.declined.push(conn);
        Ok(())
    }

    fn poll_event(
        &mut self,
        _timeout: Option<Duration>,
    ) -> Result<Option<TransportEvent>, TransportError> {
        Ok(self.events.pop_front())
    }
}
