//! ATT request dispatcher for the peripheral role.
//!
//! Decodes each inbound PDU, routes writes to the matching characteristic
//! handler via the service table, and encodes the response. PDUs are
//! processed strictly one at a time per connection; the dispatcher holds no
//! state of its own beyond the configured server MTU.

use log::{debug, info, warn};

use super::constants::*;
use super::error::{AttError, AttErrorCode};
use super::pdu::{
    AttPacket, ErrorResponse, ExchangeMtuRequest, ExchangeMtuResponse, WriteCommand, WriteRequest,
    WriteResponse,
};
use crate::gatt::types::ATT_VALUE_MAX;
use crate::gatt::{ServiceTable, WriteOutcome, WriteRequestEvent};
use crate::session::ConnectionSession;

/// Stateless PDU dispatcher.
pub struct Dispatcher {
    server_mtu: u16,
}

impl Dispatcher {
    /// Creates a dispatcher advertising the given server receive MTU,
    /// clamped to the legal [23, 517] range.
    pub fn new(server_mtu: u16) -> Self {
        Self {
            server_mtu: server_mtu.clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU),
        }
    }

    pub fn server_mtu(&self) -> u16 {
        self.server_mtu
    }

    /// Processes one inbound PDU for the given session. Returns the
    /// response bytes to send, or `None` when the PDU warrants no reply
    /// (commands, empty input).
    pub fn dispatch(
        &self,
        table: &ServiceTable,
        session: &mut ConnectionSession,
        pdu: &[u8],
    ) -> Option<Vec<u8>> {
        let opcode = *pdu.first()?;

        match opcode {
            ATT_EXCHANGE_MTU_REQ => Some(self.exchange_mtu(session, pdu)),
            ATT_WRITE_REQ => Some(self.write_request(table, session, pdu)),
            ATT_WRITE_CMD => {
                self.write_command(table, session, pdu);
                None
            }
            op if op & ATT_OPCODE_COMMAND_FLAG != 0 => {
                // Unknown command: dropped, never answered
                debug!("dropping unsupported command opcode 0x{:02x}", op);
                None
            }
            op => {
                debug!("rejecting unsupported request opcode 0x{:02x}", op);
                Some(
                    ErrorResponse::new(op, 0, AttErrorCode::RequestNotSupported).serialize(),
                )
            }
        }
    }

    fn exchange_mtu(&self, session: &mut ConnectionSession, pdu: &[u8]) -> Vec<u8> {
        let request = match ExchangeMtuRequest::parse(pdu) {
            Ok(request) => request,
            Err(e) => return ErrorResponse::from_error(ATT_EXCHANGE_MTU_REQ, &e).serialize(),
        };

        let negotiated = session.negotiate_mtu(request.client_mtu, self.server_mtu);
        debug!(
            "MTU exchange with {}: client {} server {} -> {}",
            session.peer(),
            request.client_mtu,
            self.server_mtu,
            negotiated
        );

        ExchangeMtuResponse {
            server_mtu: self.server_mtu,
        }
        .serialize()
    }

    fn write_request(
        &self,
        table: &ServiceTable,
        session: &ConnectionSession,
        pdu: &[u8],
    ) -> Vec<u8> {
        let request = match WriteRequest::parse(pdu) {
            Ok(request) => request,
            Err(e) => return ErrorResponse::from_error(ATT_WRITE_REQ, &e).serialize(),
        };

        let event = WriteRequestEvent {
            handle: request.handle,
            payload: request.value,
            offset: 0,
            expects_response: true,
        };

        match self.execute_write(table, session, &event, true) {
            Ok(()) => WriteResponse.serialize(),
            Err(e) => ErrorResponse::from_error(ATT_WRITE_REQ, &e).serialize(),
        }
    }

    fn write_command(&self, table: &ServiceTable, session: &ConnectionSession, pdu: &[u8]) {
        let command = match WriteCommand::parse(pdu) {
            Ok(command) => command,
            Err(e) => {
                debug!("dropping malformed write command: {}", e);
                return;
            }
        };

        let event = WriteRequestEvent {
            handle: command.handle,
            payload: command.value,
            offset: 0,
            expects_response: false,
        };

        // Fire and forget: failures are logged, never answered
        if let Err(e) = self.execute_write(table, session, &event, false) {
            warn!("write command from {} failed: {}", session.peer(), e);
        }
    }

    /// Shared validation and handler invocation for both write flavors.
    /// Validation failures short-circuit before the handler runs.
    fn execute_write(
        &self,
        table: &ServiceTable,
        session: &ConnectionSession,
        event: &WriteRequestEvent,
        with_response: bool,
    ) -> Result<(), AttError> {
        let characteristic = table
            .characteristic_by_handle(event.handle)
            .ok_or(AttError::InvalidHandle(event.handle))?;

        let permitted = if with_response {
            characteristic.props().can_write()
        } else {
            characteristic.props().can_write_without_response()
        };
        if !permitted {
            return Err(AttError::WriteNotPermitted(event.handle));
        }

        let max = usize::from(session.mtu()) - ATT_WRITE_HEADER_SIZE;
        let max = max.min(ATT_VALUE_MAX);
        if event.payload.len() > max {
            return Err(AttError::InvalidValueLength {
                handle: event.handle,
                len: event.payload.len(),
                max,
            });
        }

        info!(
            "write to {} ({} bytes): {}",
            characteristic.uuid(),
            event.payload.len(),
            hex::encode(&event.payload)
        );

        match characteristic.invoke_handler(event) {
            Some(WriteOutcome::Success) => Ok(()),
            Some(WriteOutcome::ApplicationError(code)) => Err(AttError::Application {
                handle: event.handle,
                code,
            }),
            // Writable characteristics always carry a handler; registration
            // enforces it. Report Unlikely rather than panic if violated.
            None => {
                warn!(
                    "characteristic {} has no write handler",
                    characteristic.uuid()
                );
                Err(AttError::Unlikely(event.handle))
            }
        }
    }
}
