//! The peripheral host: one event loop over the transport.
//!
//! All mutations of advertising state and of the active session happen
//! inside [`PeripheralHost::handle_event`], so transitions are serialized
//! by construction: a power-off arriving mid-teardown cannot race the
//! disconnect handler. PDUs are dispatched in arrival order, one at a
//! time per connection.

use std::time::Duration;

use log::{error, info, warn};

use crate::att::{Dispatcher, ATT_MAX_MTU};
use crate::error::HostError;
use crate::gap::{Advertiser, AdvertisingError, AdvertisingState};
use crate::gatt::ServiceTable;
use crate::session::{SessionError, SessionManager};
use crate::transport::{PowerState, Transport, TransportEvent};

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Local name carried in the scan response.
    pub local_name: String,
    /// Server receive MTU offered during MTU exchange, clamped to
    /// [23, 517].
    pub max_mtu: u16,
    /// Poll timeout for the run loop.
    pub poll_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            local_name: "blueperiph".to_string(),
            max_mtu: ATT_MAX_MTU,
            poll_timeout: Duration::from_millis(500),
        }
    }
}

/// A single-service, single-session BLE GATT peripheral host.
pub struct PeripheralHost<T: Transport> {
    transport: T,
    table: ServiceTable,
    advertiser: Advertiser,
    sessions: SessionManager,
    dispatcher: Dispatcher,
    poll_timeout: Duration,
    shutdown: bool,
}

impl<T: Transport> PeripheralHost<T> {
    /// Builds a host around a registered service table. The advertised
    /// UUID list is taken from the table.
    pub fn new(transport: T, table: ServiceTable, config: HostConfig) -> Self {
        let advertiser = Advertiser::new(config.local_name, vec![*table.service_uuid()]);
        Self {
            transport,
            table,
            advertiser,
            sessions: SessionManager::new(),
            dispatcher: Dispatcher::new(config.max_mtu),
            poll_timeout: config.poll_timeout,
            shutdown: false,
        }
    }

    pub fn advertising_state(&self) -> AdvertisingState {
        self.advertiser.state()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn table(&self) -> &ServiceTable {
        &self.table
    }

    /// Requests the run loop to exit after the current event.
    pub fn shutdown(&mut self) {
        self.shutdown = true;
    }

    /// Polls the transport and processes events until shutdown or until
    /// the transport itself fails. Per-event errors are surfaced to the
    /// operator and the loop keeps going; only a dead transport ends it.
    pub fn run(&mut self) -> Result<(), HostError> {
        info!("peripheral host running");
        while !self.shutdown {
            match self.transport.poll_event(Some(self.poll_timeout))? {
                Some(event) => {
                    if let Err(e) = self.handle_event(event) {
                        error!("event handling failed: {}", e);
                    }
                }
                None => continue,
            }
        }
        info!("peripheral host stopped");
        Ok(())
    }

    /// Polls once and processes the event, if any. Returns whether an
    /// event was processed, for callers driving the host from their own
    /// loop.
    pub fn handle_next(&mut self) -> Result<bool, HostError> {
        match self.transport.poll_event(Some(self.poll_timeout))? {
            Some(event) => {
                self.handle_event(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Processes one transport event. This is the only place advertising
    /// and session state change.
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<(), HostError> {
        match event {
            TransportEvent::PowerChanged(PowerState::On) => {
                self.advertiser.on_power_on();
                // A start failure leaves us Idle awaiting the next trigger;
                // it is surfaced, not retried in a loop.
                if let Err(e) = self.advertiser.start(&mut self.transport) {
                    warn!("advertising start failed: {}", e);
                }
                Ok(())
            }
            TransportEvent::PowerChanged(PowerState::Off) => {
                if let Some(session) = self.sessions.close_current() {
                    info!("session with {} closed: radio powered off", session.peer());
                }
                self.advertiser.on_power_off(&mut self.transport);
                Ok(())
            }
            TransportEvent::ConnectionOpened { conn, peer } => {
                match self.sessions.open(conn, peer) {
                    Ok(session) => {
                        info!("central {} connected (conn 0x{:04x})", session.peer(), conn);
                        self.advertiser.on_connected(&mut self.transport);
                        Ok(())
                    }
                    Err(err @ SessionError::Busy { .. }) => {
                        warn!("{}", err);
                        self.transport.decline_connection(conn)?;
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            }
            TransportEvent::ConnectionClosed { conn, reason } => {
                match self.sessions.close(conn) {
                    Ok(session) => info!(
                        "central {} disconnected (reason 0x{:02x})",
                        session.peer(),
                        reason
                    ),
                    Err(SessionError::NotFound(_)) => {
                        warn!("disconnect for unknown connection 0x{:04x}", conn)
                    }
                    Err(err) => return Err(err.into()),
                }
                // Resume advertising in the same tick
                match self.advertiser.resume(&mut self.transport) {
                    Ok(()) | Err(AdvertisingError::PoweredOff) => Ok(()),
                    Err(e) => {
                        warn!("advertising resume failed: {}", e);
                        Ok(())
                    }
                }
            }
            TransportEvent::PduReceived { conn, pdu } => {
                let Some(session) = self.sessions.get_mut(conn) else {
                    warn!("dropping PDU for unknown connection 0x{:04x}", conn);
                    return Ok(());
                };
                if let Some(response) = self.dispatcher.dispatch(&self.table, session, &pdu) {
                    self.transport.send_pdu(conn, &response)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::att::constants::*;
    use crate::gap::BdAddr;
    use crate::gatt::{
        CharacteristicDescriptor, CharacteristicProps, ServiceDescriptor, WriteOutcome,
        WriteRequestEvent,
    };
    use crate::session::SessionState;
    use crate::transport::mock::MockTransport;
    use crate::uuid::Uuid;

    const CONN: u16 = 0x0040;

    fn service_uuid() -> Uuid {
        "12345678-1234-5678-1234-56789abcdef0".parse().unwrap()
    }

    fn char_uuid() -> Uuid {
        "12345678-1234-5678-1234-56789abcdef1".parse().unwrap()
    }

    struct Recorder {
        calls: AtomicUsize,
        events: Mutex<Vec<WriteRequestEvent>>,
        outcome: WriteOutcome,
    }

    impl Recorder {
        fn new(outcome: WriteOutcome) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                events: Mutex::new(Vec::new()),
                outcome,
            })
        }
    }

    fn host_with(
        recorder: Arc<Recorder>,
        props: CharacteristicProps,
    ) -> PeripheralHost<MockTransport> {
        let handler = move |event: &WriteRequestEvent| {
            recorder.calls.fetch_add(1, Ordering::SeqCst);
            recorder.events.lock().unwrap().push(event.clone());
            recorder.outcome
        };
        let service = ServiceDescriptor::new(service_uuid()).characteristic(
            CharacteristicDescriptor::new(char_uuid(), props).with_handler(handler),
        );
        let table = ServiceTable::register(service).unwrap();
        PeripheralHost::new(
            MockTransport::new(),
            table,
            HostConfig {
                local_name: "MyBLEDevice".to_string(),
                max_mtu: 23,
                ..HostConfig::default()
            },
        )
    }

    fn write_props() -> CharacteristicProps {
        CharacteristicProps::WRITE | CharacteristicProps::WRITE_WITHOUT_RESPONSE
    }

    fn peer() -> BdAddr {
        BdAddr::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06])
    }

    fn power_on_and_connect(host: &mut PeripheralHost<MockTransport>) {
        host.handle_event(TransportEvent::PowerChanged(PowerState::On))
            .unwrap();
        host.handle_event(TransportEvent::ConnectionOpened {
            conn: CONN,
            peer: peer(),
        })
        .unwrap();
    }

    fn value_handle(host: &PeripheralHost<MockTransport>) -> u16 {
        host.table()
            .characteristic_by_uuid(&char_uuid())
            .unwrap()
            .value_handle()
    }

    fn write_request_pdu(handle: u16, value: &[u8]) -> Vec<u8> {
        let mut pdu = vec![ATT_WRITE_REQ];
        pdu.extend_from_slice(&handle.to_le_bytes());
        pdu.extend_from_slice(value);
        pdu
    }

    #[test]
    fn test_power_on_starts_advertising() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());

        assert_eq!(host.advertising_state(), AdvertisingState::PoweredOff);
        host.handle_event(TransportEvent::PowerChanged(PowerState::On))
            .unwrap();
        assert_eq!(host.advertising_state(), AdvertisingState::Advertising);
        assert_eq!(host.transport.adv_starts, 1);

        // The advertised payload carries the service UUID
        let data = host.transport.last_adv_data.as_ref().unwrap();
        let adv = data.advertising_bytes();
        assert!(adv
            .windows(16)
            .any(|w| w == service_uuid().as_bytes_le().as_slice()));
    }

    #[test]
    fn test_connect_stops_advertising_and_opens_session() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());
        power_on_and_connect(&mut host);

        assert_eq!(host.advertising_state(), AdvertisingState::Idle);
        assert_eq!(host.transport.adv_stops, 1);

        let session = host.sessions().active().unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.peer(), peer());
        assert_eq!(session.mtu(), ATT_DEFAULT_MTU);
    }

    #[test]
    fn test_mtu_exchange_min_rule() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());
        power_on_and_connect(&mut host);

        // Client proposes 512, our max is 23
        let mut pdu = vec![ATT_EXCHANGE_MTU_REQ];
        pdu.extend_from_slice(&512u16.to_le_bytes());
        host.handle_event(TransportEvent::PduReceived { conn: CONN, pdu })
            .unwrap();

        let session = host.sessions().active().unwrap();
        assert_eq!(session.mtu(), 23);
        assert_eq!(session.state(), SessionState::Active);

        let (conn, response) = host.transport.sent.last().unwrap();
        assert_eq!(*conn, CONN);
        assert_eq!(response[0], ATT_EXCHANGE_MTU_RSP);
        assert_eq!(u16::from_le_bytes([response[1], response[2]]), 23);
    }

    #[test]
    fn test_write_request_hello_invokes_handler_once() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder.clone(), write_props());
        power_on_and_connect(&mut host);

        let handle = value_handle(&host);
        host.handle_event(TransportEvent::PduReceived {
            conn: CONN,
            pdu: write_request_pdu(handle, b"hello"),
        })
        .unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0].payload, vec![0x68, 0x65, 0x6c, 0x6c, 0x6f]);
        assert_eq!(events[0].offset, 0);
        assert!(events[0].expects_response);

        let (_, response) = host.transport.sent.last().unwrap();
        assert_eq!(response.as_slice(), &[ATT_WRITE_RSP]);
    }

    #[test]
    fn test_write_request_application_error_response() {
        let recorder = Recorder::new(WriteOutcome::ApplicationError(0x85));
        let mut host = host_with(recorder.clone(), write_props());
        power_on_and_connect(&mut host);

        let handle = value_handle(&host);
        host.handle_event(TransportEvent::PduReceived {
            conn: CONN,
            pdu: write_request_pdu(handle, b"nope"),
        })
        .unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        let (_, response) = host.transport.sent.last().unwrap();
        assert_eq!(response[0], ATT_ERROR_RSP);
        assert_eq!(response[1], ATT_WRITE_REQ);
        assert_eq!(u16::from_le_bytes([response[2], response[3]]), handle);
        assert_eq!(response[4], 0x85);
    }

    #[test]
    fn test_write_command_never_answered() {
        // Handler fails, yet no PDU goes out
        let recorder = Recorder::new(WriteOutcome::ApplicationError(0x85));
        let mut host = host_with(recorder.clone(), write_props());
        power_on_and_connect(&mut host);

        let handle = value_handle(&host);
        let mut pdu = vec![ATT_WRITE_CMD];
        pdu.extend_from_slice(&handle.to_le_bytes());
        pdu.extend_from_slice(b"hello");

        host.handle_event(TransportEvent::PduReceived { conn: CONN, pdu })
            .unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        let events = recorder.events.lock().unwrap();
        assert!(!events[0].expects_response);
        assert!(host.transport.sent.is_empty());
    }

    #[test]
    fn test_write_unknown_handle_short_circuits() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder.clone(), write_props());
        power_on_and_connect(&mut host);

        host.handle_event(TransportEvent::PduReceived {
            conn: CONN,
            pdu: write_request_pdu(9999, b"hello"),
        })
        .unwrap();

        // Handler never invoked
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);

        let (_, response) = host.transport.sent.last().unwrap();
        assert_eq!(response[0], ATT_ERROR_RSP);
        assert_eq!(response[1], ATT_WRITE_REQ);
        assert_eq!(u16::from_le_bytes([response[2], response[3]]), 9999);
        assert_eq!(response[4], ATT_ERROR_INVALID_HANDLE);
    }

    #[test]
    fn test_write_to_non_writable_characteristic() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder.clone(), CharacteristicProps::READ);
        power_on_and_connect(&mut host);

        let handle = value_handle(&host);
        host.handle_event(TransportEvent::PduReceived {
            conn: CONN,
            pdu: write_request_pdu(handle, b"hello"),
        })
        .unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
        let (_, response) = host.transport.sent.last().unwrap();
        assert_eq!(response[0], ATT_ERROR_RSP);
        assert_eq!(response[4], ATT_ERROR_WRITE_NOT_PERMITTED);
    }

    #[test]
    fn test_oversized_write_rejected_against_mtu() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder.clone(), write_props());
        power_on_and_connect(&mut host);

        // Default MTU 23 allows at most 20 value bytes
        let handle = value_handle(&host);
        host.handle_event(TransportEvent::PduReceived {
            conn: CONN,
            pdu: write_request_pdu(handle, &[0u8; 21]),
        })
        .unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
        let (_, response) = host.transport.sent.last().unwrap();
        assert_eq!(response[0], ATT_ERROR_RSP);
        assert_eq!(response[4], ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH);
    }

    #[test]
    fn test_second_connection_rejected_session_unchanged() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());
        power_on_and_connect(&mut host);

        host.handle_event(TransportEvent::ConnectionOpened {
            conn: 0x0041,
            peer: BdAddr::new([0xAA; 6]),
        })
        .unwrap();

        assert_eq!(host.transport.declined, vec![0x0041]);
        let session = host.sessions().active().unwrap();
        assert_eq!(session.conn(), CONN);
        assert_eq!(session.peer(), peer());
    }

    #[test]
    fn test_disconnect_closes_session_and_resumes_advertising() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());
        power_on_and_connect(&mut host);

        // Activate via MTU exchange so the full Active -> Closed path runs
        let mut pdu = vec![ATT_EXCHANGE_MTU_REQ];
        pdu.extend_from_slice(&23u16.to_le_bytes());
        host.handle_event(TransportEvent::PduReceived { conn: CONN, pdu })
            .unwrap();
        assert_eq!(
            host.sessions().active().unwrap().state(),
            SessionState::Active
        );

        host.handle_event(TransportEvent::ConnectionClosed {
            conn: CONN,
            reason: 0x13,
        })
        .unwrap();

        // Session released and advertising resumed within the same tick
        assert!(host.sessions().active().is_none());
        assert_eq!(host.advertising_state(), AdvertisingState::Advertising);
        assert_eq!(host.transport.adv_starts, 2);
    }

    #[test]
    fn test_power_off_from_any_state() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());

        // From Advertising
        host.handle_event(TransportEvent::PowerChanged(PowerState::On))
            .unwrap();
        host.handle_event(TransportEvent::PowerChanged(PowerState::Off))
            .unwrap();
        assert_eq!(host.advertising_state(), AdvertisingState::PoweredOff);

        // Mid-connection: the session is torn down locally too
        host.handle_event(TransportEvent::PowerChanged(PowerState::On))
            .unwrap();
        host.handle_event(TransportEvent::ConnectionOpened {
            conn: CONN,
            peer: peer(),
        })
        .unwrap();
        host.handle_event(TransportEvent::PowerChanged(PowerState::Off))
            .unwrap();
        assert_eq!(host.advertising_state(), AdvertisingState::PoweredOff);
        assert!(host.sessions().active().is_none());
    }

    #[test]
    fn test_advertising_failure_leaves_idle() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());
        host.transport.fail_next_adv_start = true;

        host.handle_event(TransportEvent::PowerChanged(PowerState::On))
            .unwrap();
        assert_eq!(host.advertising_state(), AdvertisingState::Idle);
        assert_eq!(host.transport.adv_starts, 0);
    }

    #[test]
    fn test_unknown_request_opcode_gets_error_response() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());
        power_on_and_connect(&mut host);

        // Read Request (0x0A) is not served by this host
        host.handle_event(TransportEvent::PduReceived {
            conn: CONN,
            pdu: vec![0x0A, 0x03, 0x00],
        })
        .unwrap();

        let (_, response) = host.transport.sent.last().unwrap();
        assert_eq!(response[0], ATT_ERROR_RSP);
        assert_eq!(response[1], 0x0A);
        assert_eq!(response[4], ATT_ERROR_REQUEST_NOT_SUPPORTED);
    }

    #[test]
    fn test_unknown_command_opcode_dropped() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder, write_props());
        power_on_and_connect(&mut host);

        // Signed Write Command (0xD2) carries the command flag
        host.handle_event(TransportEvent::PduReceived {
            conn: CONN,
            pdu: vec![0xD2, 0x03, 0x00, 0x01],
        })
        .unwrap();
        assert!(host.transport.sent.is_empty());
    }

    #[test]
    fn test_pdu_for_unknown_connection_dropped() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder.clone(), write_props());
        power_on_and_connect(&mut host);

        let handle = value_handle(&host);
        host.handle_event(TransportEvent::PduReceived {
            conn: 0x0099,
            pdu: write_request_pdu(handle, b"hello"),
        })
        .unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
        assert!(host.transport.sent.is_empty());
    }

    #[test]
    fn test_run_loop_drains_scripted_events() {
        let recorder = Recorder::new(WriteOutcome::Success);
        let mut host = host_with(recorder.clone(), write_props());

        host.transport
            .queue(TransportEvent::PowerChanged(PowerState::On));
        host.transport.queue(TransportEvent::ConnectionOpened {
            conn: CONN,
            peer: peer(),
        });
        // value handle is fixed by registration order: service 1, decl 2, value 3
        host.transport.queue(TransportEvent::PduReceived {
            conn: CONN,
            pdu: write_request_pdu(3, b"hello"),
        });
        host.transport.queue(TransportEvent::ConnectionClosed {
            conn: CONN,
            reason: 0x13,
        });

        // Drain the script manually; run() would block on the empty queue
        while let Ok(Some(event)) = host.transport.poll_event(None) {
            host.handle_event(event).unwrap();
        }

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(host.advertising_state(), AdvertisingState::Advertising);
    }
}
