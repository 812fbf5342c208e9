//! A minimal write-sink peripheral.
//!
//! Hosts one service with one writable characteristic and prints every
//! value a central writes to it. The radio here is a scripted transport
//! that replays a canned session (power-on, connect, MTU exchange, a few
//! writes, disconnect) so the example runs without Bluetooth hardware;
//! swap in a real `Transport` implementation to put it on the air.
//!
//! Run with `RUST_LOG=debug cargo run --example write_server` to watch the
//! host's own logging alongside the received values.

use std::collections::VecDeque;
use std::time::Duration;

use blueperiph::gap::payload::AdvertisingData;
use blueperiph::{
    CharacteristicDescriptor, ConnectionId, HostConfig, PeripheralHost, PowerState,
    ServiceDescriptor, ServiceTable, Transport, TransportError, TransportEvent, Uuid,
    WriteOutcome, WriteRequestEvent,
};

const SERVICE_UUID: &str = "12345678-1234-5678-1234-56789abcdef0";
const WRITE_CHAR_UUID: &str = "12345678-1234-5678-1234-56789abcdef1";

/// Replays a canned event sequence and prints what the host sends back.
struct ScriptedTransport {
    events: VecDeque<TransportEvent>,
}

impl ScriptedTransport {
    fn new(events: Vec<TransportEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), TransportError> {
        println!(
            "[radio] advertising ({} adv bytes, {} scan rsp bytes)",
            data.advertising_bytes().len(),
            data.scan_response_bytes().len()
        );
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        println!("[radio] advertising stopped");
        Ok(())
    }

    fn send_pdu(&mut self, conn: ConnectionId, pdu: &[u8]) -> Result<(), TransportError> {
        println!("[radio] -> conn 0x{:04x}: {}", conn, hex::encode(pdu));
        Ok(())
    }

    fn decline_connection(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        println!("[radio] declined conn 0x{:04x}", conn);
        Ok(())
    }

    fn poll_event(
        &mut self,
        _timeout: Option<Duration>,
    ) -> Result<Option<TransportEvent>, TransportError> {
        Ok(self.events.pop_front())
    }
}

fn write_pdu(opcode: u8, handle: u16, value: &[u8]) -> Vec<u8> {
    let mut pdu = vec![opcode];
    pdu.extend_from_slice(&handle.to_le_bytes());
    pdu.extend_from_slice(value);
    pdu
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let service_uuid: Uuid = SERVICE_UUID.parse()?;
    let char_uuid: Uuid = WRITE_CHAR_UUID.parse()?;

    let service = ServiceDescriptor::new(service_uuid).characteristic(
        CharacteristicDescriptor::writable(char_uuid, |event: &WriteRequestEvent| {
            match std::str::from_utf8(&event.payload) {
                Ok(text) => println!("received: {}", text),
                Err(_) => println!("received {} raw bytes", event.payload.len()),
            }
            WriteOutcome::Success
        }),
    );
    let table = ServiceTable::register(service)?;
    let value_handle = table
        .characteristic_by_uuid(&char_uuid)
        .ok_or("characteristic missing after registration")?
        .value_handle();

    let conn: ConnectionId = 0x0040;
    let peer = blueperiph::BdAddr::new([0xC0, 0xDE, 0xCA, 0xFE, 0x00, 0x01]);
    let transport = ScriptedTransport::new(vec![
        TransportEvent::PowerChanged(PowerState::On),
        TransportEvent::ConnectionOpened { conn, peer },
        TransportEvent::PduReceived {
            conn,
            pdu: vec![0x02, 0xF7, 0x00], // client proposes MTU 247
        },
        TransportEvent::PduReceived {
            conn,
            pdu: write_pdu(0x12, value_handle, b"hello"),
        },
        TransportEvent::PduReceived {
            conn,
            pdu: write_pdu(0x12, value_handle, b"from a central"),
        },
        TransportEvent::ConnectionClosed { conn, reason: 0x13 },
        TransportEvent::PowerChanged(PowerState::Off),
    ]);

    let mut host = PeripheralHost::new(
        transport,
        table,
        HostConfig {
            local_name: "MyBLEDevice".to_string(),
            max_mtu: 247,
            ..HostConfig::default()
        },
    );

    // Drain the script; a real transport would block in poll_event and
    // host.run() would loop until shutdown.
    while host.handle_next()? {}
    Ok(())
}
